//! Client for the runtime configuration service's HTTP API.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use reqwest::StatusCode;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordLimits {
    pub min_length: u32,
    pub max_length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsRequirement {
    pub password: PasswordLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub id: String,
    pub module: String,
    pub key: String,
    pub value: Value,
    pub description: String,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingValue {
    pub id: String,
    pub value: Value,
}

pub struct SettingsClient {
    client: Client,
    base_url: String,
    admin_key: Option<String>,
}

impl SettingsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_key: None,
        }
    }

    /// Authenticate admin calls with this key.
    pub fn with_admin_key(mut self, key: &str) -> Self {
        self.admin_key = Some(key.to_string());
        self
    }

    /// Public password requirements.
    pub async fn credentials_requirement(&self) -> Result<CredentialsRequirement, ClientError> {
        self.send(self.client.get(format!("{}/api/v1/credentials", self.base_url)))
            .await
    }

    pub async fn list(&self, module: Option<&str>) -> Result<Vec<Setting>, ClientError> {
        let mut req = self.admin(self.client.get(format!("{}/admin/settings", self.base_url)));
        if let Some(module) = module {
            req = req.query(&[("module", module)]);
        }
        self.send(req).await
    }

    pub async fn get(&self, id: &str) -> Result<SettingValue, ClientError> {
        self.send(self.admin(self.client.get(format!("{}/admin/settings/{}", self.base_url, id))))
            .await
    }

    pub async fn set(&self, id: &str, value: &Value) -> Result<Setting, ClientError> {
        let req = self
            .client
            .put(format!("{}/admin/settings/{}", self.base_url, id))
            .json(value);
        self.send(self.admin(req)).await
    }

    fn admin(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.admin_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(resp.json().await?)
    }
}
