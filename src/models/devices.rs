use serde::{Deserialize, Serialize};

/// Canonical reachability values reported by the controller inventory
pub mod reachability_status {
    pub const REACHABLE: &str = "Reachable";
    pub const UNREACHABLE: &str = "Unreachable";
}

/// Reachability of a device at inventory time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    Reachable,
    Unreachable,
    Unknown,
}

impl Reachability {
    pub fn from_status(status: &str) -> Self {
        match status {
            reachability_status::REACHABLE => Reachability::Reachable,
            reachability_status::UNREACHABLE => Reachability::Unreachable,
            _ => Reachability::Unknown,
        }
    }
}

/// Device represents a network device managed by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub hostname: String,
    pub device_type: String,
    pub reachability: Reachability,
}

impl Device {
    pub fn is_reachable(&self) -> bool {
        self.reachability == Reachability::Reachable
    }
}
