use crate::auth::Session;
use crate::config::PollSettings;
use crate::dnac::types::{DeviceTypeRef, ProjectInfo, TemplateCommit, TemplatePayload};
use crate::dnac::Controller;
use crate::error::{Error, Result};
use crate::jobs::{wait_for_task, wait_for_task_success};
use crate::models::{Project, Template, TemplateConventions};

/// Reconciles projects and templates against the controller.
///
/// The controller keys writes by id while callers know names, so every write
/// resolves name to id first. A lookup that finds nothing is `NotFound` and
/// drives the create path; every other lookup failure propagates.
pub struct TemplateRegistry<'a, C: Controller> {
    session: &'a Session<C>,
    poll: PollSettings,
    conventions: TemplateConventions,
}

impl<'a, C: Controller> TemplateRegistry<'a, C> {
    pub fn new(session: &'a Session<C>, poll: PollSettings) -> Self {
        Self {
            session,
            poll,
            conventions: TemplateConventions::default(),
        }
    }

    pub fn with_conventions(mut self, conventions: TemplateConventions) -> Self {
        self.conventions = conventions;
        self
    }

    async fn find_project(&self, name: &str) -> Result<ProjectInfo> {
        self.session
            .controller()
            .find_projects(self.session.token()?, name)
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::not_found("project", name))
    }

    /// Resolve a template id by matching its name among the project's templates
    pub async fn find_template_id(&self, template_name: &str, project_name: &str) -> Result<String> {
        let project = self.find_project(project_name).await?;
        project
            .templates
            .into_iter()
            .find(|t| t.name == template_name)
            .map(|t| t.id)
            .ok_or_else(|| Error::not_found("template", template_name))
    }

    /// Return the project's id, creating the project if it does not exist
    pub async fn ensure_project(&self, name: &str) -> Result<Project> {
        match self.find_project(name).await {
            Ok(existing) => {
                tracing::info!("Project '{}' found: {}", name, existing.id);
                return Ok(Project {
                    id: existing.id,
                    name: existing.name,
                });
            }
            Err(e) if e.is_not_found() => {
                tracing::info!("Project '{}' not found, creating it", name);
            }
            Err(e) => return Err(e),
        }

        let task = self
            .session
            .controller()
            .create_project(self.session.token()?, name)
            .await?;
        let outcome = wait_for_task_success(self.session, &task.task_id, self.poll).await?;

        let id = match outcome.data {
            Some(id) => id,
            None => match self.find_project(name).await {
                Ok(created) => created.id,
                Err(e) if e.is_not_found() => {
                    return Err(Error::data_shape(format!("project '{}' creation returned no id", name)))
                }
                Err(e) => return Err(e),
            },
        };

        tracing::info!("Project '{}' created: {}", name, id);
        Ok(Project {
            id,
            name: name.to_string(),
        })
    }

    fn payload(&self, template: &Template, project: &Project, id: Option<String>) -> TemplatePayload {
        TemplatePayload {
            id,
            name: template.name.clone(),
            tags: Vec::new(),
            author: self.conventions.author.clone(),
            device_types: self
                .conventions
                .product_families
                .iter()
                .map(|f| DeviceTypeRef {
                    product_family: f.clone(),
                })
                .collect(),
            software_type: self.conventions.software_type.clone(),
            software_variant: self.conventions.software_variant.clone(),
            software_version: String::new(),
            template_content: template.body.clone(),
            rollback_template_content: String::new(),
            rollback_template_params: Vec::new(),
            language: self.conventions.language.clone(),
            template_params: template.params.clone(),
            project_id: project.id.clone(),
            project_name: project.name.clone(),
        }
    }

    /// Create or update the template, then commit a new version.
    ///
    /// The returned id always refers to a committed template. When the
    /// write succeeds but the commit does not, `Error::Commit` is returned
    /// and the template stays non-deployable until `commit` succeeds.
    pub async fn ensure_template(&self, template: &Template, project: &Project) -> Result<String> {
        let (template_id, message) = match self.find_template_id(&template.name, &project.name).await {
            Ok(id) => {
                tracing::info!("Template '{}' found ({}), updating", template.name, id);
                let payload = self.payload(template, project, Some(id.clone()));
                let task = self
                    .session
                    .controller()
                    .update_template(self.session.token()?, &payload)
                    .await?;
                wait_for_task_success(self.session, &task.task_id, self.poll).await?;
                (id, "updated and committed by dnac-rollout")
            }
            Err(e) if e.is_not_found() => {
                tracing::info!("Template '{}' not found in '{}', creating", template.name, project.name);
                let payload = self.payload(template, project, None);
                let task = self
                    .session
                    .controller()
                    .create_template(self.session.token()?, &project.id, &payload)
                    .await?;
                let outcome = wait_for_task_success(self.session, &task.task_id, self.poll).await?;
                let id = match outcome.data {
                    Some(id) => id,
                    None => self.find_template_id(&template.name, &project.name).await?,
                };
                (id, "created and committed by dnac-rollout")
            }
            Err(e) => return Err(e),
        };

        self.commit(&template_id, message).await?;
        Ok(template_id)
    }

    /// Create a new immutable version of the template's current content
    pub async fn commit(&self, template_id: &str, message: &str) -> Result<()> {
        let commit = TemplateCommit {
            template_id: template_id.to_string(),
            comments: message.to_string(),
        };

        match self.submit_commit(&commit).await {
            Ok(_) => {
                tracing::info!("Template {} committed", template_id);
                Ok(())
            }
            Err(e) if e.is_fatal() || matches!(e, Error::StaleReference { .. }) => Err(e),
            Err(e) => Err(Error::Commit {
                template_id: template_id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn submit_commit(&self, commit: &TemplateCommit) -> Result<()> {
        let task = self
            .session
            .controller()
            .commit_template(self.session.token()?, commit)
            .await?;
        wait_for_task_success(self.session, &task.task_id, self.poll).await?;
        Ok(())
    }

    /// Best-effort removal; an already absent template is not an error
    pub async fn delete_template(&self, template_name: &str, project_name: &str) -> Result<()> {
        let id = match self.find_template_id(template_name, project_name).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Template '{}' not found in '{}', nothing to delete", template_name, project_name);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let task = self
            .session
            .controller()
            .delete_template(self.session.token()?, &id)
            .await?;
        let outcome = wait_for_task(self.session, &task.task_id, self.poll).await?;
        if outcome.is_error {
            tracing::warn!("Deleting template {} reported: {:?}", id, outcome.failure_reason);
        } else {
            tracing::info!("Template '{}' ({}) deleted", template_name, id);
        }
        Ok(())
    }

    /// Best-effort removal; an already absent project is not an error
    pub async fn delete_project(&self, name: &str) -> Result<()> {
        let project = match self.find_project(name).await {
            Ok(p) => p,
            Err(e) if e.is_not_found() => {
                tracing::warn!("Project '{}' not found, nothing to delete", name);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let task = self
            .session
            .controller()
            .delete_project(self.session.token()?, &project.id)
            .await?;
        let outcome = wait_for_task(self.session, &task.task_id, self.poll).await?;
        if outcome.is_error {
            tracing::warn!("Deleting project {} reported: {:?}", project.id, outcome.failure_reason);
        } else {
            tracing::info!("Project '{}' ({}) deleted", name, project.id);
        }
        Ok(())
    }
}
