use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{TaskOutcome, TemplateParameter};

// --- DNA Center API types ---

/// Most intent API responses wrap their payload in `{"response": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(rename = "Token")]
    pub token: Option<String>,
}

/// Raw inventory record; fields the pipeline relies on are validated by the inventory filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDevice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(rename = "type", default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub reachability_status: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub platform_id: Option<String>,
    #[serde(default)]
    pub management_ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub templates: Vec<TemplateSummary>,
}

/// Handle returned by every asynchronous write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub task_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Completion marker, epoch milliseconds
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl TaskInfo {
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn into_outcome(self, task_id: &str) -> TaskOutcome {
        TaskOutcome {
            task_id: self.id.unwrap_or_else(|| task_id.to_string()),
            is_error: self.is_error.unwrap_or(false),
            progress: self.progress.unwrap_or_default(),
            data: self.data.filter(|d| !d.is_empty()),
            failure_reason: self.failure_reason,
            finished_at: self.end_time.and_then(epoch_millis),
        }
    }
}

fn epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    #[serde(default)]
    pub deployment_id: Option<String>,
}

impl DeployResponse {
    /// The controller answers with prose such as "Template Deployemnt Id: <id>"
    pub fn parsed_id(&self) -> Option<String> {
        self.deployment_id
            .as_deref()
            .and_then(|text| text.split_whitespace().last())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusResponse {
    #[serde(default)]
    pub deployment_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// --- Request types ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTypeRef {
    pub product_family: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ProjectCreate {
    pub name: String,
}

/// Body for both template create (no `id`) and template update
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub tags: Vec<String>,
    pub author: String,
    pub device_types: Vec<DeviceTypeRef>,
    pub software_type: String,
    pub software_variant: String,
    pub software_version: String,
    pub template_content: String,
    pub rollback_template_content: String,
    pub rollback_template_params: Vec<TemplateParameter>,
    pub language: String,
    pub template_params: Vec<TemplateParameter>,
    pub project_id: String,
    pub project_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCommit {
    pub template_id: String,
    pub comments: String,
}

pub mod target_type {
    pub const MANAGED_DEVICE_HOSTNAME: &str = "MANAGED_DEVICE_HOSTNAME";
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub template_id: String,
    pub force_push_template: bool,
    pub target_info: Vec<TargetInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_id_parsing() {
        let resp: DeployResponse = serde_json::from_str(
            r#"{"deploymentId": "Template Deployemnt Id: 5cf2a1a8-07bb-4e5a-8d2a-4e1b5e2f1c3d"}"#,
        )
        .unwrap();
        assert_eq!(resp.parsed_id().as_deref(), Some("5cf2a1a8-07bb-4e5a-8d2a-4e1b5e2f1c3d"));

        let resp: DeployResponse = serde_json::from_str(r#"{"deploymentId": "   "}"#).unwrap();
        assert_eq!(resp.parsed_id(), None);

        let resp: DeployResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(resp.parsed_id(), None);
    }

    #[test]
    fn test_network_device_fields() {
        let dev: NetworkDevice = serde_json::from_str(
            r#"{"id": "d1", "hostname": "PDX-RN", "type": "Cisco Catalyst 9300 Switch",
                "reachabilityStatus": "Reachable", "family": "Switches and Hubs"}"#,
        )
        .unwrap();
        assert_eq!(dev.device_type.as_deref(), Some("Cisco Catalyst 9300 Switch"));
        assert_eq!(dev.reachability_status.as_deref(), Some("Reachable"));
        assert_eq!(dev.management_ip_address, None);
    }

    #[test]
    fn test_task_outcome() {
        let info: TaskInfo = serde_json::from_str(
            r#"{"id": "t1", "isError": false, "progress": "done", "data": "proj-1", "endTime": 1590000000000}"#,
        )
        .unwrap();
        assert!(info.is_complete());
        let outcome = info.into_outcome("t1");
        assert_eq!(outcome.data.as_deref(), Some("proj-1"));
        assert!(!outcome.is_error);
        assert!(outcome.finished_at.is_some());

        let pending: TaskInfo = serde_json::from_str(r#"{"progress": "running"}"#).unwrap();
        assert!(!pending.is_complete());
    }

    #[test]
    fn test_template_payload_shape() {
        let payload = TemplatePayload {
            id: None,
            name: "ntp_server".into(),
            tags: vec![],
            author: "dnac-rollout".into(),
            device_types: vec![DeviceTypeRef { product_family: "Routers".into() }],
            software_type: "IOS-XE".into(),
            software_variant: "XE".into(),
            software_version: String::new(),
            template_content: "ntp server {{ ntp }}".into(),
            rollback_template_content: String::new(),
            rollback_template_params: vec![],
            language: "JINJA".into(),
            template_params: vec![TemplateParameter::string("ntp", 1)],
            project_id: "p1".into(),
            project_name: "Cat9k".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["deviceTypes"][0]["productFamily"], "Routers");
        assert_eq!(json["templateParams"][0]["parameterName"], "ntp");
        assert_eq!(json["language"], "JINJA");
    }
}
