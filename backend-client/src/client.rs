use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use tracing::debug;
use warden_protocol::Mission;
use warden_state::MissionMirror;

use crate::error::BackendError;

/// Timeout for create, update and delete calls.
pub const MUTATION_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for pulling the full mission list.
pub const PULL_TIMEOUT: Duration = Duration::from_secs(10);

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Debug)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    api_key: String,
}

impl Client {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, BackendError> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(BackendError::Build)?;
        Ok(Self {
            base_url,
            http,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static("warden-agent"));
        if let Ok(hv) = HeaderValue::from_str(&self.api_key) {
            h.insert(HeaderName::from_static(API_KEY_HEADER), hv);
        }
        h
    }

    fn missions_url(&self) -> String {
        format!("{}/api/missions", self.base_url)
    }

    fn mission_url(&self, mission_id: &str) -> String {
        format!("{}/api/missions/{mission_id}", self.base_url)
    }

    async fn exec_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Mission>,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let mut req = self
            .http
            .request(method.clone(), url)
            .headers(self.headers())
            .timeout(timeout);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req.send().await.map_err(|source| BackendError::Request {
            method: method.clone(),
            url: url.to_string(),
            source,
        })?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::Status {
                method,
                url: url.to_string(),
                status,
                body,
            });
        }
        debug!(%method, url, %status, "backend request succeeded");
        Ok(body)
    }

    fn decode_json<T: DeserializeOwned>(&self, url: &str, body: String) -> Result<T, BackendError> {
        serde_json::from_str::<T>(&body).map_err(|source| BackendError::Decode {
            url: url.to_string(),
            body,
            source,
        })
    }

    pub async fn create_mission(&self, mission: &Mission) -> Result<(), BackendError> {
        let url = self.missions_url();
        self.exec_request(Method::POST, &url, Some(mission), MUTATION_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn update_mission(&self, mission: &Mission) -> Result<(), BackendError> {
        let url = self.mission_url(&mission.id);
        self.exec_request(Method::PUT, &url, Some(mission), MUTATION_TIMEOUT)
            .await?;
        Ok(())
    }

    pub async fn delete_mission(&self, mission_id: &str) -> Result<(), BackendError> {
        let url = self.mission_url(mission_id);
        self.exec_request(Method::DELETE, &url, None, MUTATION_TIMEOUT)
            .await?;
        Ok(())
    }

    /// The backend's full mission list.
    pub async fn list_missions(&self) -> Result<Vec<Mission>, BackendError> {
        let url = self.missions_url();
        let body = self
            .exec_request(Method::GET, &url, None, PULL_TIMEOUT)
            .await?;
        self.decode_json(&url, body)
    }
}

#[async_trait]
impl MissionMirror for Client {
    async fn create_mission(&self, mission: &Mission) -> anyhow::Result<()> {
        Ok(Client::create_mission(self, mission).await?)
    }

    async fn update_mission(&self, mission: &Mission) -> anyhow::Result<()> {
        Ok(Client::update_mission(self, mission).await?)
    }

    async fn delete_mission(&self, mission_id: &str) -> anyhow::Result<()> {
        Ok(Client::delete_mission(self, mission_id).await?)
    }

    async fn fetch_missions(&self) -> anyhow::Result<Vec<Mission>> {
        Ok(self.list_missions().await?)
    }
}
