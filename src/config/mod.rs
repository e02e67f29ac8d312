use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::TemplateConventions;

/// Credentials used to request a controller token
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Fixed interval and overall cap for polling loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub dnac_url: String,
    pub credentials: Credentials,
    pub accept_invalid_certs: bool,
    pub request_timeout: Duration,
    pub project: String,
    pub template_file: String,
    pub device_types: Vec<String>,
    pub template_values: HashMap<String, serde_json::Value>,
    pub poll: PollSettings,
    pub report_path: String,
    pub page_size: u32,
    pub conventions: TemplateConventions,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Result<Self> {
        let defaults = PollSettings::default();

        Ok(Self {
            dnac_url: get_env("DNAC_URL", ""),
            credentials: Credentials {
                username: get_env("DNAC_USER", ""),
                password: get_env("DNAC_PASS", ""),
            },
            accept_invalid_certs: parse_bool(&get_env("DNAC_ACCEPT_INVALID_CERTS", "true")),
            request_timeout: Duration::from_secs(
                get_env("DNAC_REQUEST_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            ),
            project: get_env("DNAC_PROJECT", "Cat9k_GS_Prov"),
            template_file: get_env("DNAC_TEMPLATE_FILE", "gs_prov.j2"),
            device_types: parse_list(&get_env("DNAC_DEVICE_TYPES", "")),
            template_values: parse_values(&get_env("DNAC_TEMPLATE_VALUES", "{}"))?,
            poll: PollSettings {
                interval: get_env("DNAC_POLL_INTERVAL_SECS", "")
                    .parse()
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.interval),
                timeout: get_env("DNAC_POLL_TIMEOUT_SECS", "")
                    .parse()
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
            },
            report_path: get_env("DNAC_REPORT_PATH", "rollout_report.csv"),
            page_size: get_env("DNAC_PAGE_SIZE", "500")
                .parse::<u32>()
                .unwrap_or(500)
                .max(1),
            conventions: load_conventions(),
        })
    }

    /// Reject configurations that cannot reach a controller
    pub fn validate(&self) -> Result<()> {
        if self.dnac_url.is_empty() {
            return Err(Error::Config("DNAC_URL is not set".into()));
        }
        if self.credentials.username.is_empty() || self.credentials.password.is_empty() {
            return Err(Error::Config("DNAC_USER and DNAC_PASS must both be set".into()));
        }
        if self.poll.interval.is_zero() {
            return Err(Error::Config("DNAC_POLL_INTERVAL_SECS must be positive".into()));
        }
        if self.poll.timeout < self.poll.interval {
            return Err(Error::Config(
                "DNAC_POLL_TIMEOUT_SECS must be at least the poll interval".into(),
            ));
        }
        Ok(())
    }
}

/// Metadata stamped on created templates; unset variables keep the defaults
fn load_conventions() -> TemplateConventions {
    let defaults = TemplateConventions::default();
    let families = parse_list(&get_env("DNAC_PRODUCT_FAMILIES", ""));

    TemplateConventions {
        product_families: if families.is_empty() {
            defaults.product_families
        } else {
            families
        },
        software_type: get_env("DNAC_SOFTWARE_TYPE", &defaults.software_type),
        software_variant: get_env("DNAC_SOFTWARE_VARIANT", &defaults.software_variant),
        language: defaults.language,
        author: get_env("DNAC_TEMPLATE_AUTHOR", &defaults.author),
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Comma separated list; device type names contain spaces but never commas
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_values(value: &str) -> Result<HashMap<String, serde_json::Value>> {
    if value.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_json::from_str(value)
        .map_err(|e| Error::Config(format!("DNAC_TEMPLATE_VALUES is not a JSON object: {}", e)))
}
