//! In-memory controller used by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::models::TemplateParameter;

use super::types::*;
use super::Controller;

/// Scripted behaviour of one device's deployment
#[derive(Debug, Clone)]
pub struct DeployScript {
    pub reject: bool,
    /// Status returned by each successive poll; the last one repeats
    pub statuses: Vec<&'static str>,
}

impl Default for DeployScript {
    fn default() -> Self {
        Self {
            reject: false,
            statuses: vec!["SUCCESS"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredTemplate {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub body: String,
    pub params: Vec<TemplateParameter>,
    pub versions: u32,
}

#[derive(Debug, Clone)]
struct StoredTask {
    info: TaskInfo,
    /// Polls that answer "still running" before `info` is returned
    pending_polls: u32,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub devices: Vec<NetworkDevice>,
    pub projects: Vec<(String, String)>,
    pub templates: Vec<StoredTemplate>,
    tasks: HashMap<String, StoredTask>,
    pub scripts: HashMap<String, DeployScript>,
    deployments: HashMap<String, (String, usize)>,
    next_id: u32,

    /// Deploy submissions a token survives; `None` never expires
    pub token_submit_budget: Option<u32>,
    token_uses: HashMap<String, u32>,
    current_token: Option<String>,
    pub reject_credentials: bool,

    pub fail_commit: bool,
    pub task_pending_polls: u32,
    pub task_transient_failures: u32,
    /// Template ids that vanish before the next write
    pub vanished_templates: Vec<String>,
    /// Deployment status lookups answer 404
    pub status_not_found: bool,
    /// Project creation tasks carry no id in their data
    pub project_task_without_id: bool,
    /// Status returned by project lookups once a project has been created
    pub lookup_error_after_create: Option<u16>,

    pub auth_calls: u32,
    pub create_project_calls: u32,
    pub create_template_calls: u32,
    pub update_template_calls: u32,
    pub commit_calls: Vec<String>,
    pub submitted: Vec<String>,
    pub status_polls: HashMap<String, u32>,
    pub task_polls: u32,
    pub deleted_templates: Vec<String>,
    pub deleted_projects: Vec<String>,
}

#[derive(Default)]
pub struct FakeController {
    pub state: Mutex<FakeState>,
}

pub fn device(hostname: &str, device_type: &str, reachability: &str) -> NetworkDevice {
    NetworkDevice {
        id: Some(format!("id-{}", hostname)),
        hostname: Some(hostname.to_string()),
        device_type: Some(device_type.to_string()),
        reachability_status: Some(reachability.to_string()),
        ..Default::default()
    }
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<NetworkDevice>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().devices = devices;
        fake
    }

    pub fn script(&self, hostname: &str, script: DeployScript) {
        self.state.lock().unwrap().scripts.insert(hostname.to_string(), script);
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check_token(&self, token: &str) -> Result<()> {
        if self.current_token.as_deref() != Some(token) {
            return Err(Error::Auth(format!("unknown token {}", token)));
        }
        Ok(())
    }

    fn finished_task(&mut self, data: Option<String>, error: Option<String>) -> TaskRef {
        let task_id = self.next_id("task");
        let info = TaskInfo {
            id: Some(task_id.clone()),
            is_error: Some(error.is_some()),
            progress: Some("done".into()),
            data,
            failure_reason: error,
            end_time: Some(1_600_000_000_000),
        };
        let pending_polls = self.task_pending_polls;
        self.tasks.insert(task_id.clone(), StoredTask { info, pending_polls });
        TaskRef { task_id, url: None }
    }
}

#[async_trait]
impl Controller for FakeController {
    async fn authenticate(&self, credentials: &Credentials) -> Result<String> {
        let mut s = self.state.lock().unwrap();
        s.auth_calls += 1;
        if s.reject_credentials || credentials.password.is_empty() {
            return Err(Error::Auth("bad credentials".into()));
        }
        let token = format!("token-{}", s.auth_calls);
        s.current_token = Some(token.clone());
        Ok(token)
    }

    async fn list_devices(&self, token: &str, offset: u32, limit: u32) -> Result<Vec<NetworkDevice>> {
        let s = self.state.lock().unwrap();
        s.check_token(token)?;
        let start = offset.saturating_sub(1) as usize;
        Ok(s.devices.iter().skip(start).take(limit as usize).cloned().collect())
    }

    async fn find_projects(&self, token: &str, name: &str) -> Result<Vec<ProjectInfo>> {
        let s = self.state.lock().unwrap();
        s.check_token(token)?;
        if let Some(status) = s.lookup_error_after_create.filter(|_| s.create_project_calls > 0) {
            return Err(Error::Api {
                status,
                body: "lookup failed".into(),
            });
        }
        Ok(s.projects
            .iter()
            .filter(|(_, n)| n == name)
            .map(|(id, n)| ProjectInfo {
                id: id.clone(),
                name: n.clone(),
                templates: s
                    .templates
                    .iter()
                    .filter(|t| &t.project_id == id)
                    .map(|t| TemplateSummary {
                        id: t.id.clone(),
                        name: t.name.clone(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn create_project(&self, token: &str, name: &str) -> Result<TaskRef> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        s.create_project_calls += 1;
        let id = s.next_id("project");
        s.projects.push((id.clone(), name.to_string()));
        let data = if s.project_task_without_id { None } else { Some(id) };
        Ok(s.finished_task(data, None))
    }

    async fn delete_project(&self, token: &str, project_id: &str) -> Result<TaskRef> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        let before = s.projects.len();
        s.projects.retain(|(id, _)| id != project_id);
        if s.projects.len() == before {
            return Err(Error::stale("project", project_id));
        }
        s.templates.retain(|t| t.project_id != project_id);
        s.deleted_projects.push(project_id.to_string());
        Ok(s.finished_task(None, None))
    }

    async fn create_template(&self, token: &str, project_id: &str, template: &TemplatePayload) -> Result<TaskRef> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        if !s.projects.iter().any(|(id, _)| id == project_id) {
            return Err(Error::stale("project", project_id));
        }
        s.create_template_calls += 1;
        let id = s.next_id("template");
        s.templates.push(StoredTemplate {
            id: id.clone(),
            project_id: project_id.to_string(),
            name: template.name.clone(),
            body: template.template_content.clone(),
            params: template.template_params.clone(),
            versions: 0,
        });
        Ok(s.finished_task(Some(id), None))
    }

    async fn update_template(&self, token: &str, template: &TemplatePayload) -> Result<TaskRef> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        s.update_template_calls += 1;
        let id = template.id.clone().unwrap_or_default();
        if s.vanished_templates.contains(&id) {
            return Err(Error::stale("template", id));
        }
        let stored = s
            .templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::stale("template", id.clone()))?;
        stored.body = template.template_content.clone();
        stored.params = template.template_params.clone();
        Ok(s.finished_task(Some(id), None))
    }

    async fn commit_template(&self, token: &str, commit: &TemplateCommit) -> Result<TaskRef> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        s.commit_calls.push(commit.template_id.clone());
        if s.vanished_templates.contains(&commit.template_id) {
            return Err(Error::stale("template", commit.template_id.clone()));
        }
        if s.fail_commit {
            return Ok(s.finished_task(None, Some("version conflict".into())));
        }
        if let Some(t) = s.templates.iter_mut().find(|t| t.id == commit.template_id) {
            t.versions += 1;
        }
        Ok(s.finished_task(None, None))
    }

    async fn delete_template(&self, token: &str, template_id: &str) -> Result<TaskRef> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        s.templates.retain(|t| t.id != template_id);
        s.deleted_templates.push(template_id.to_string());
        Ok(s.finished_task(None, None))
    }

    async fn deploy_template(&self, token: &str, request: &DeployRequest) -> Result<DeployResponse> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        if let Some(budget) = s.token_submit_budget {
            let uses = s.token_uses.entry(token.to_string()).or_insert(0);
            if *uses >= budget {
                return Err(Error::Auth("token expired".into()));
            }
            *uses += 1;
        }

        let hostname = request.target_info[0].id.clone();
        s.submitted.push(hostname.clone());
        let script = s.scripts.get(&hostname).cloned().unwrap_or_default();
        if script.reject {
            return Err(Error::Submit {
                device: hostname,
                reason: "payload rejected".into(),
            });
        }

        let id = s.next_id("deploy");
        s.deployments.insert(id.clone(), (hostname, 0));
        Ok(DeployResponse {
            deployment_id: Some(format!("Template Deployemnt Id: {}", id)),
        })
    }

    async fn deployment_status(&self, token: &str, deployment_id: &str) -> Result<DeploymentStatusResponse> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        *s.status_polls.entry(deployment_id.to_string()).or_insert(0) += 1;
        if s.status_not_found {
            return Err(Error::Api {
                status: 404,
                body: "no such deployment".into(),
            });
        }

        let (hostname, polled) = s
            .deployments
            .get(deployment_id)
            .cloned()
            .ok_or_else(|| Error::Api { status: 404, body: "no such deployment".into() })?;
        let script = s.scripts.get(&hostname).cloned().unwrap_or_default();
        let status = script.statuses[polled.min(script.statuses.len() - 1)];
        s.deployments.insert(deployment_id.to_string(), (hostname, polled + 1));

        Ok(DeploymentStatusResponse {
            deployment_id: Some(deployment_id.to_string()),
            status: Some(status.to_string()),
        })
    }

    async fn task_status(&self, token: &str, task_id: &str) -> Result<TaskInfo> {
        let mut s = self.state.lock().unwrap();
        s.check_token(token)?;
        s.task_polls += 1;
        if s.task_transient_failures > 0 {
            s.task_transient_failures -= 1;
            return Err(Error::Api { status: 503, body: "busy".into() });
        }
        let task = s
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::Api { status: 404, body: "no such task".into() })?;
        if task.pending_polls > 0 {
            task.pending_polls -= 1;
            return Ok(TaskInfo {
                id: Some(task_id.to_string()),
                progress: Some("running".into()),
                ..Default::default()
            });
        }
        Ok(task.info.clone())
    }
}
