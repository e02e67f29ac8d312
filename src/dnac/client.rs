use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::{Config, Credentials};
use crate::error::{Error, Result};

use super::types::*;
use super::Controller;

const AUTH_HEADER: &str = "X-Auth-Token";
const TEMPLATE_PROGRAMMER: &str = "/intent/api/v1/template-programmer";

/// DNA Center API client
pub struct DnacClient {
    base_url: String,
    client: Client,
}

impl DnacClient {
    pub fn new(url: &str, accept_invalid_certs: bool, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.dnac_url, cfg.accept_invalid_certs, cfg.request_timeout)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/dna{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .header(AUTH_HEADER, token)
            .header("Accept", "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str, query: &[(&str, String)]) -> Result<T> {
        tracing::debug!("GET {}", path);
        let resp = self
            .authed(self.client.get(self.api_url(path)), token)
            .query(query)
            .send()
            .await?;

        read_json(ensure_success(resp, None).await?, path).await
    }

    /// Helper for POST/PUT writes that answer with a task handle
    async fn write_task<B: serde::Serialize>(
        &self,
        builder: RequestBuilder,
        path: &str,
        token: &str,
        body: &B,
        stale: Option<(&'static str, &str)>,
    ) -> Result<TaskRef> {
        tracing::debug!("write {}", path);
        let resp = self.authed(builder, token).json(body).send().await?;
        let envelope: Envelope<TaskRef> = read_json(ensure_success(resp, stale).await?, path).await?;
        Ok(envelope.response)
    }

    async fn delete_task(&self, path: &str, token: &str, kind: &'static str, id: &str) -> Result<TaskRef> {
        tracing::debug!("DELETE {}", path);
        let resp = self
            .authed(self.client.delete(self.api_url(path)), token)
            .send()
            .await?;
        let envelope: Envelope<TaskRef> = read_json(ensure_success(resp, Some((kind, id))).await?, path).await?;
        Ok(envelope.response)
    }
}

#[async_trait]
impl Controller for DnacClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<String> {
        let resp = self
            .client
            .post(self.api_url("/system/api/v1/auth/token"))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token request returned {}: {}", status, body)));
        }

        let text = resp.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))?;

        parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("token response has no Token field".into()))
    }

    async fn list_devices(&self, token: &str, offset: u32, limit: u32) -> Result<Vec<NetworkDevice>> {
        let envelope: Envelope<Vec<NetworkDevice>> = self
            .get_json(
                "/intent/api/v1/network-device",
                token,
                &[("offset", offset.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(envelope.response)
    }

    async fn find_projects(&self, token: &str, name: &str) -> Result<Vec<ProjectInfo>> {
        self.get_json(
            &format!("{}/project", TEMPLATE_PROGRAMMER),
            token,
            &[("name", name.to_string())],
        )
        .await
    }

    async fn create_project(&self, token: &str, name: &str) -> Result<TaskRef> {
        let path = format!("{}/project", TEMPLATE_PROGRAMMER);
        let body = ProjectCreate { name: name.to_string() };
        self.write_task(self.client.post(self.api_url(&path)), &path, token, &body, None)
            .await
    }

    async fn delete_project(&self, token: &str, project_id: &str) -> Result<TaskRef> {
        let path = format!("{}/project/{}", TEMPLATE_PROGRAMMER, project_id);
        self.delete_task(&path, token, "project", project_id).await
    }

    async fn create_template(&self, token: &str, project_id: &str, template: &TemplatePayload) -> Result<TaskRef> {
        let path = format!("{}/project/{}/template", TEMPLATE_PROGRAMMER, project_id);
        self.write_task(
            self.client.post(self.api_url(&path)),
            &path,
            token,
            template,
            Some(("project", project_id)),
        )
        .await
    }

    async fn update_template(&self, token: &str, template: &TemplatePayload) -> Result<TaskRef> {
        let path = format!("{}/template", TEMPLATE_PROGRAMMER);
        let id = template.id.as_deref().unwrap_or_default();
        self.write_task(
            self.client.put(self.api_url(&path)),
            &path,
            token,
            template,
            Some(("template", id)),
        )
        .await
    }

    async fn commit_template(&self, token: &str, commit: &TemplateCommit) -> Result<TaskRef> {
        let path = format!("{}/template/version", TEMPLATE_PROGRAMMER);
        self.write_task(
            self.client.post(self.api_url(&path)),
            &path,
            token,
            commit,
            Some(("template", commit.template_id.as_str())),
        )
        .await
    }

    async fn delete_template(&self, token: &str, template_id: &str) -> Result<TaskRef> {
        let path = format!("{}/template/{}", TEMPLATE_PROGRAMMER, template_id);
        self.delete_task(&path, token, "template", template_id).await
    }

    async fn deploy_template(&self, token: &str, request: &DeployRequest) -> Result<DeployResponse> {
        let path = format!("{}/template/deploy", TEMPLATE_PROGRAMMER);
        let device = request
            .target_info
            .first()
            .map(|t| t.id.clone())
            .unwrap_or_default();

        tracing::debug!("POST {} for {}", path, device);
        let resp = self
            .authed(self.client.post(self.api_url(&path)), token)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Auth("token rejected by deploy endpoint".into()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Submit {
                device,
                reason: format!("{}: {}", status, body),
            });
        }

        read_json(resp, &path).await
    }

    async fn deployment_status(&self, token: &str, deployment_id: &str) -> Result<DeploymentStatusResponse> {
        self.get_json(
            &format!("{}/template/deploy/status/{}", TEMPLATE_PROGRAMMER, deployment_id),
            token,
            &[],
        )
        .await
    }

    async fn task_status(&self, token: &str, task_id: &str) -> Result<TaskInfo> {
        let envelope: Envelope<TaskInfo> = self
            .get_json(&format!("/intent/api/v1/task/{}", task_id), token, &[])
            .await?;
        Ok(envelope.response)
    }
}

/// Map non-2xx responses onto the error taxonomy
async fn ensure_success(resp: Response, stale: Option<(&'static str, &str)>) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Auth("token rejected or expired".into()));
    }
    if status == StatusCode::NOT_FOUND {
        if let Some((kind, id)) = stale {
            return Err(Error::stale(kind, id));
        }
    }

    let body = resp.text().await.unwrap_or_default();
    tracing::debug!("controller API error {}: {}", status, body);
    Err(Error::Api {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| Error::data_shape(format!("{}: {}", what, e)))
}
