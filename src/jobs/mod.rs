use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::time::{sleep, Instant};

use crate::auth::Session;
use crate::config::PollSettings;
use crate::dnac::types::{target_type, DeployRequest, TargetInfo};
use crate::dnac::Controller;
use crate::error::{Error, Result};
use crate::models::{DeploymentStatus, Device, TaskOutcome};

/// Tracks elapsed time and attempts for one bounded polling loop
struct PollClock {
    settings: PollSettings,
    started: Instant,
    attempts: u32,
}

impl PollClock {
    fn start(settings: PollSettings) -> Self {
        Self {
            settings,
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Sleep one interval and count an attempt, or return false if that would overrun the cap
    async fn tick(&mut self) -> bool {
        match self.started.elapsed().checked_add(self.settings.interval) {
            Some(next) if next <= self.settings.timeout => {}
            _ => return false,
        }
        sleep(self.settings.interval).await;
        self.attempts += 1;
        true
    }

    fn timed_out(&self, id: &str) -> Error {
        Error::PollTimeout {
            id: id.to_string(),
            attempts: self.attempts,
            waited: self.started.elapsed(),
        }
    }
}

/// Wait for a generic controller task to carry its completion marker.
///
/// Failed attempts are logged and retried at the next interval unless they
/// are fatal; the loop only gives up when the cap is reached.
pub async fn wait_for_task<C: Controller>(
    session: &Session<C>,
    task_id: &str,
    settings: PollSettings,
) -> Result<TaskOutcome> {
    let mut clock = PollClock::start(settings);

    while clock.tick().await {
        match session.controller().task_status(session.token()?, task_id).await {
            Ok(info) if info.is_complete() => {
                let outcome = info.into_outcome(task_id);
                tracing::debug!(
                    "Task {} finished after {} polls (error={})",
                    task_id,
                    clock.attempts,
                    outcome.is_error
                );
                return Ok(outcome);
            }
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Task {} poll #{} failed, retrying: {}", task_id, clock.attempts, e);
            }
        }
    }

    Err(clock.timed_out(task_id))
}

/// Wait for a task and turn a task-level failure into an error
pub async fn wait_for_task_success<C: Controller>(
    session: &Session<C>,
    task_id: &str,
    settings: PollSettings,
) -> Result<TaskOutcome> {
    let outcome = wait_for_task(session, task_id, settings).await?;
    if outcome.is_error {
        return Err(Error::Task {
            task_id: outcome.task_id.clone(),
            reason: outcome
                .failure_reason
                .clone()
                .unwrap_or_else(|| outcome.progress.clone()),
        });
    }
    Ok(outcome)
}

/// One template deployment to one device
#[derive(Debug, Clone)]
pub struct DeploymentTask {
    pub template_id: String,
    pub hostname: String,
    pub deployment_id: String,
    pub status: DeploymentStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl DeploymentTask {
    /// Submit a deployment; rejections surface as `Error::Submit` and are never retried
    pub async fn submit<C: Controller>(
        session: &Session<C>,
        template_id: &str,
        device: &Device,
        params: &HashMap<String, serde_json::Value>,
    ) -> Result<Self> {
        let request = DeployRequest {
            template_id: template_id.to_string(),
            force_push_template: true,
            target_info: vec![TargetInfo {
                id: device.hostname.clone(),
                target_type: target_type::MANAGED_DEVICE_HOSTNAME.to_string(),
                params: params.clone(),
            }],
        };

        let response = session
            .controller()
            .deploy_template(session.token()?, &request)
            .await?;
        let deployment_id = response.parsed_id().ok_or_else(|| Error::Submit {
            device: device.hostname.clone(),
            reason: "response carried no deployment id".into(),
        })?;

        tracing::info!(
            "Deployment of template {} to {} submitted: {}",
            template_id,
            device.hostname,
            deployment_id
        );

        Ok(Self {
            template_id: template_id.to_string(),
            hostname: device.hostname.clone(),
            deployment_id,
            status: DeploymentStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            attempts: 0,
        })
    }

    /// Record an observed status; terminal states are final
    fn observe(&mut self, status: DeploymentStatus) {
        if self.status.is_terminal() {
            return;
        }
        // the controller may still report INIT after work started
        if status == DeploymentStatus::Pending && self.status == DeploymentStatus::Running {
            return;
        }
        self.status = status;
        if status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    /// Poll the deployment status at a fixed interval until it is terminal or the cap elapses
    pub async fn poll<C: Controller>(
        &mut self,
        session: &Session<C>,
        settings: PollSettings,
    ) -> Result<DeploymentStatus> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let mut clock = PollClock::start(settings);

        while clock.tick().await {
            self.attempts = clock.attempts;
            match session
                .controller()
                .deployment_status(session.token()?, &self.deployment_id)
                .await
            {
                Ok(resp) => {
                    let status = DeploymentStatus::from_remote(resp.status.as_deref().unwrap_or_default());
                    self.observe(status);
                    if self.status.is_terminal() {
                        tracing::info!(
                            "Deployment {} on {} finished: {} ({} polls)",
                            self.deployment_id,
                            self.hostname,
                            self.status,
                            self.attempts
                        );
                        return Ok(self.status);
                    }
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Deployment {} status poll #{} failed, retrying: {}",
                        self.deployment_id,
                        clock.attempts,
                        e
                    );
                }
                Err(e) => {
                    // the deployment can no longer be tracked
                    self.observe(DeploymentStatus::Failure);
                    tracing::warn!(
                        "Deployment {} on {} lost after poll #{}: {}",
                        self.deployment_id,
                        self.hostname,
                        clock.attempts,
                        e
                    );
                    return Err(e);
                }
            }
        }

        self.observe(DeploymentStatus::TimedOut);
        tracing::warn!(
            "Deployment {} on {} did not finish within {:?}",
            self.deployment_id,
            self.hostname,
            settings.timeout
        );
        Err(clock.timed_out(&self.deployment_id))
    }
}
