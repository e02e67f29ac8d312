//! Batch rollout of one committed template across a window of devices.
//!
//! Execution is strictly sequential: each device is submitted and polled to
//! a terminal status before the next one starts, and a fresh token is
//! fetched at the top of every device iteration so batches may outlive a
//! single token.

mod gate;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::Session;
use crate::config::PollSettings;
use crate::dnac::Controller;
use crate::error::{Error, Result};
use crate::inventory::{self, Classification};
use crate::jobs::DeploymentTask;
use crate::models::{Device, EntryStatus, ReportEntry, Template, TemplateConventions};
use crate::report::ReportSink;
use crate::templates::TemplateRegistry;

pub use gate::{AlwaysProceed, ConfirmGate, PromptGate};

/// Contiguous slice of the eligible devices selected for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub count: usize,
}

impl Window {
    pub fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// Shrink the window so it never runs past `population`
    pub fn clamp(self, population: usize) -> Window {
        let start = self.start.min(population);
        Window {
            start,
            count: self.count.min(population - start),
        }
    }

    pub fn select<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let w = self.clamp(items.len());
        &items[w.start..w.start + w.count]
    }
}

/// Everything one run needs besides the controller connection
#[derive(Debug, Clone)]
pub struct RolloutPlan {
    pub project: String,
    pub template: Template,
    pub allowed_types: Vec<String>,
    pub window: Window,
    pub values: HashMap<String, serde_json::Value>,
}

/// Ordered outcome of one rollout run
#[derive(Debug)]
pub struct RolloutReport {
    pub run_id: Uuid,
    pub template_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Window actually used after clamping
    pub window: Window,
    pub entries: Vec<ReportEntry>,
    /// Fatal error that stopped the run early
    pub aborted: Option<Error>,
    /// Operator declined to continue at a confirmation gate
    pub halted: bool,
}

impl RolloutReport {
    fn new(template_id: &str, window: Window) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            template_id: template_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            window,
            entries: Vec::new(),
            aborted: None,
            halted: false,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| !e.failed()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.failed()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && !self.halted && self.entries.len() == self.window.count
    }
}

/// Composes session, registry, inventory and deployment tasks into a run
pub struct RolloutCoordinator<C: Controller> {
    session: Session<C>,
    poll: PollSettings,
    page_size: u32,
    conventions: TemplateConventions,
    gate: Box<dyn ConfirmGate>,
}

impl<C: Controller> RolloutCoordinator<C> {
    pub fn new(session: Session<C>, poll: PollSettings) -> Self {
        Self {
            session,
            poll,
            page_size: 500,
            conventions: TemplateConventions::default(),
            gate: Box::new(AlwaysProceed),
        }
    }

    pub fn with_gate(mut self, gate: impl ConfirmGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_conventions(mut self, conventions: TemplateConventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Make sure the project exists and the template is created or updated and committed
    pub async fn upload(&mut self, project: &str, template: &Template) -> Result<String> {
        self.session.authenticate().await?;
        let registry = TemplateRegistry::new(&self.session, self.poll).with_conventions(self.conventions.clone());
        let project = registry.ensure_project(project).await?;
        registry.ensure_template(template, &project).await
    }

    /// Fetch and classify the current inventory
    pub async fn classify(&mut self, allowed_types: &[String]) -> Result<Classification> {
        self.session.authenticate().await?;
        let all = inventory::fetch_all(&self.session, self.page_size).await?;
        let classified = inventory::classify(&all, allowed_types)?;

        tracing::info!(
            "Inventory: {} eligible, {} ineligible (unreachable), {} of other types",
            classified.eligible.len(),
            classified.ineligible.len(),
            classified.skipped.len()
        );
        for device in &classified.ineligible {
            tracing::warn!("{} is {:?}, it will not be deployed", device.hostname, device.reachability);
        }
        Ok(classified)
    }

    /// Full pipeline: upload, classify, deploy the window, flush the report.
    ///
    /// Errors before the first deployment (authentication, reconciliation,
    /// commit, inventory shape) are returned as `Err`. Once deployments
    /// start, the report is always flushed to `sink`, including when a
    /// fatal error cut the run short.
    pub async fn run(&mut self, plan: &RolloutPlan, sink: &mut dyn ReportSink) -> Result<RolloutReport> {
        tracing::info!("Rollout of '{}' in project '{}' started", plan.template.name, plan.project);
        check_values(&plan.template, &plan.values)?;

        let template_id = self.upload(&plan.project, &plan.template).await?;
        if !self.gate.confirm(&format!("Template '{}' committed, continue", plan.template.name)) {
            let mut report = RolloutReport::new(&template_id, Window::new(plan.window.start, 0));
            report.halted = true;
            return Ok(report);
        }

        let classified = self.classify(&plan.allowed_types).await?;
        let report = self
            .rollout(&template_id, &classified.eligible, plan.window, &plan.values)
            .await;

        sink.write_entries(&report.entries).await?;
        log_summary(&report);
        Ok(report)
    }

    /// Deploy `template_id` to the windowed slice of `devices`, in order.
    ///
    /// Per-device failures become failed entries and the batch continues;
    /// only a fatal error stops it, recorded in `aborted`.
    pub async fn rollout(
        &mut self,
        template_id: &str,
        devices: &[Device],
        window: Window,
        values: &HashMap<String, serde_json::Value>,
    ) -> RolloutReport {
        let effective = window.clamp(devices.len());
        if effective != window {
            tracing::info!(
                "Window {}+{} clamped to {}+{} ({} eligible devices)",
                window.start,
                window.count,
                effective.start,
                effective.count,
                devices.len()
            );
        }

        let mut report = RolloutReport::new(template_id, effective);
        let selected = effective.select(devices);

        for (i, device) in selected.iter().enumerate() {
            if i > 0 && !self.gate.confirm(&format!("Deploy to {}", device.hostname)) {
                tracing::info!("Rollout halted before {}", device.hostname);
                report.halted = true;
                break;
            }

            // tokens may expire during long batches
            if let Err(e) = self.session.authenticate().await {
                tracing::error!("Re-authentication failed before {}: {}", device.hostname, e);
                report.aborted = Some(e);
                break;
            }

            match self.deploy_one(template_id, device, values).await {
                Ok(entry) => report.entries.push(entry),
                Err(e) => {
                    tracing::error!("Rollout aborted at {}: {}", device.hostname, e);
                    report.aborted = Some(e);
                    break;
                }
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }

    /// Deploy to a single device by hostname; it must exist in the inventory
    pub async fn deploy_single(
        &mut self,
        project: &str,
        template: &Template,
        hostname: &str,
        values: &HashMap<String, serde_json::Value>,
        sink: &mut dyn ReportSink,
    ) -> Result<RolloutReport> {
        check_values(template, values)?;

        let template_id = self.upload(project, template).await?;

        let all = inventory::fetch_all(&self.session, self.page_size).await?;
        let raw = all
            .iter()
            .find(|d| d.hostname.as_deref() == Some(hostname))
            .ok_or_else(|| Error::not_found("device", hostname))?;
        let device = inventory::to_device(raw)?;
        if !device.is_reachable() {
            return Err(Error::Submit {
                device: device.hostname,
                reason: format!("device is {:?}", device.reachability),
            });
        }
        let devices = vec![device];

        if !self.gate.confirm(&format!("Deploy '{}' to {}", template.name, hostname)) {
            let mut report = RolloutReport::new(&template_id, Window::new(0, 0));
            report.halted = true;
            return Ok(report);
        }

        let report = self.rollout(&template_id, &devices, Window::new(0, 1), values).await;
        sink.write_entries(&report.entries).await?;
        log_summary(&report);
        Ok(report)
    }

    /// Remove the template and, unless `keep_project`, its project
    pub async fn cleanup(&mut self, project: &str, template_name: &str, keep_project: bool) -> Result<()> {
        self.session.authenticate().await?;
        let registry = TemplateRegistry::new(&self.session, self.poll);
        registry.delete_template(template_name, project).await?;
        if !keep_project {
            registry.delete_project(project).await?;
        }
        Ok(())
    }

    /// Submit and poll one device; only fatal errors escape
    async fn deploy_one(
        &self,
        template_id: &str,
        device: &Device,
        values: &HashMap<String, serde_json::Value>,
    ) -> Result<ReportEntry> {
        let mut task = match DeploymentTask::submit(&self.session, template_id, device, values).await {
            Ok(task) => task,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Deployment to {} not submitted: {}", device.hostname, e);
                return Ok(ReportEntry {
                    hostname: device.hostname.clone(),
                    deployment_id: None,
                    status: EntryStatus::Rejected,
                    error: Some(e.to_string()),
                });
            }
        };

        let error = match task.poll(&self.session, self.poll).await {
            Ok(_) => None,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Deployment {} on {} failed: {}", task.deployment_id, device.hostname, e);
                Some(e.to_string())
            }
        };

        Ok(ReportEntry {
            hostname: device.hostname.clone(),
            deployment_id: Some(task.deployment_id),
            status: EntryStatus::Deployed(task.status),
            error,
        })
    }
}

fn check_values(template: &Template, values: &HashMap<String, serde_json::Value>) -> Result<()> {
    let missing = template.missing_values(values);
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::Config(format!(
        "no value for required template parameters: {}",
        missing.join(", ")
    )))
}

fn log_summary(report: &RolloutReport) {
    tracing::info!(
        "Rollout {} finished: {} succeeded, {} failed, {} of {} devices processed{}",
        report.run_id,
        report.succeeded(),
        report.failed(),
        report.entries.len(),
        report.window.count,
        match (&report.aborted, report.halted) {
            (Some(_), _) => " (aborted)",
            (None, true) => " (halted)",
            _ => "",
        }
    );
}
