pub mod client;
#[cfg(test)]
pub mod fake;
pub mod types;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::Result;

pub use client::DnacClient;
use types::*;

/// The controller operations the pipeline consumes.
///
/// Every call except `authenticate` carries the token issued by the most
/// recent `authenticate`. Implementations map an unknown id on an id-keyed
/// write to `Error::StaleReference`.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<String>;

    /// One page of the inventory; `offset` is 1-based
    async fn list_devices(&self, token: &str, offset: u32, limit: u32) -> Result<Vec<NetworkDevice>>;

    async fn find_projects(&self, token: &str, name: &str) -> Result<Vec<ProjectInfo>>;

    async fn create_project(&self, token: &str, name: &str) -> Result<TaskRef>;

    async fn delete_project(&self, token: &str, project_id: &str) -> Result<TaskRef>;

    async fn create_template(&self, token: &str, project_id: &str, template: &TemplatePayload) -> Result<TaskRef>;

    async fn update_template(&self, token: &str, template: &TemplatePayload) -> Result<TaskRef>;

    async fn commit_template(&self, token: &str, commit: &TemplateCommit) -> Result<TaskRef>;

    async fn delete_template(&self, token: &str, template_id: &str) -> Result<TaskRef>;

    async fn deploy_template(&self, token: &str, request: &DeployRequest) -> Result<DeployResponse>;

    async fn deployment_status(&self, token: &str, deployment_id: &str) -> Result<DeploymentStatusResponse>;

    async fn task_status(&self, token: &str, task_id: &str) -> Result<TaskInfo>;
}
