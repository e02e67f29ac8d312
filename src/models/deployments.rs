use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical deployment status strings returned by the controller
pub mod deploy_status {
    pub const INIT: &str = "INIT";
    pub const IN_PROGRESS: &str = "IN_PROGRESS";
    pub const SUCCESS: &str = "SUCCESS";
    pub const FAILURE: &str = "FAILURE";
    pub const ERROR: &str = "ERROR";
}

/// Lifecycle state of one deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Pending,
    Running,
    Success,
    Failure,
    TimedOut,
}

impl DeploymentStatus {
    pub fn from_remote(status: &str) -> Self {
        match status {
            deploy_status::SUCCESS => DeploymentStatus::Success,
            deploy_status::FAILURE | deploy_status::ERROR => DeploymentStatus::Failure,
            deploy_status::INIT | "" => DeploymentStatus::Pending,
            _ => DeploymentStatus::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentStatus::Success | DeploymentStatus::Failure | DeploymentStatus::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failure => "failure",
            DeploymentStatus::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for one device; `Rejected` covers failures before a deployment id existed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Deployed(DeploymentStatus),
    Rejected,
}

impl EntryStatus {
    pub fn is_success(self) -> bool {
        self == EntryStatus::Deployed(DeploymentStatus::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Deployed(status) => status.as_str(),
            EntryStatus::Rejected => "rejected",
        }
    }
}

/// ReportEntry is the durable record of one device in a rollout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub hostname: String,
    pub deployment_id: Option<String>,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEntry {
    pub fn failed(&self) -> bool {
        !self.status.is_success()
    }
}

/// Remote asynchronous task as reported by the task endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task_id: String,
    pub is_error: bool,
    pub progress: String,
    pub data: Option<String>,
    pub failure_reason: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_remote() {
        assert_eq!(DeploymentStatus::from_remote("SUCCESS"), DeploymentStatus::Success);
        assert_eq!(DeploymentStatus::from_remote("FAILURE"), DeploymentStatus::Failure);
        assert_eq!(DeploymentStatus::from_remote("ERROR"), DeploymentStatus::Failure);
        assert_eq!(DeploymentStatus::from_remote("INIT"), DeploymentStatus::Pending);
        assert_eq!(DeploymentStatus::from_remote("IN_PROGRESS"), DeploymentStatus::Running);
    }

    #[test]
    fn test_terminal() {
        assert!(!DeploymentStatus::Pending.is_terminal());
        assert!(!DeploymentStatus::Running.is_terminal());
        assert!(DeploymentStatus::Success.is_terminal());
        assert!(DeploymentStatus::Failure.is_terminal());
        assert!(DeploymentStatus::TimedOut.is_terminal());
    }

    #[test]
    fn test_entry_failed() {
        let entry = ReportEntry {
            hostname: "PDX-RN".into(),
            deployment_id: Some("d-1".into()),
            status: EntryStatus::Deployed(DeploymentStatus::Success),
            error: None,
        };
        assert!(!entry.failed());
        assert!(ReportEntry { status: EntryStatus::Rejected, ..entry.clone() }.failed());
        assert!(ReportEntry {
            status: EntryStatus::Deployed(DeploymentStatus::TimedOut),
            ..entry
        }
        .failed());
    }
}
