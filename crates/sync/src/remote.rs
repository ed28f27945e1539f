use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not signed in")]
    Auth,
    #[error("remote call failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote call returned status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub generation_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProjectDetail {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_prompt: Option<String>,
    #[serde(default)]
    pub last_slide_context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteGeneration {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    name: &'a str,
    prompt: &'a str,
    slide_context: &'a str,
}

/// Image bytes as an inline data URL the renderer can use directly.
pub fn encode_image_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// Bearer-authenticated client for the durable project store.
pub struct RemoteStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RemoteStore {
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let token = config.token.clone().ok_or(SyncError::Auth)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SyncError::Auth),
            status if !status.is_success() => Err(SyncError::Status(status)),
            _ => Ok(response),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, SyncError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn list_projects(&self) -> Result<Vec<RemoteProjectSummary>, SyncError> {
        Ok(self.get("/projects").await?.json().await?)
    }

    pub async fn get_project(&self, id: &str) -> Result<RemoteProjectDetail, SyncError> {
        Ok(self.get(&format!("/projects/{id}")).await?.json().await?)
    }

    /// Newest-first list of durable generation records.
    pub async fn list_generations(&self, project_id: &str) -> Result<Vec<RemoteGeneration>, SyncError> {
        Ok(self
            .get(&format!("/projects/{project_id}/generations"))
            .await?
            .json()
            .await?)
    }

    pub async fn fetch_generation_image(&self, generation_id: &str) -> Result<Vec<u8>, SyncError> {
        Ok(self
            .get(&format!("/generations/{generation_id}/image"))
            .await?
            .bytes()
            .await?
            .to_vec())
    }

    /// `None` when the project has no slide image uploaded.
    pub async fn fetch_slide_image(&self, project_id: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let response = self
            .http
            .get(self.url(&format!("/projects/{project_id}/slide")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response).await?.bytes().await?.to_vec()))
    }

    pub async fn upload_slide_image(&self, project_id: &str, bytes: &[u8]) -> Result<(), SyncError> {
        let response = self
            .http
            .put(self.url(&format!("/projects/{project_id}/slide")))
            .bearer_auth(&self.token)
            .body(bytes.to_vec())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn delete_slide_image(&self, project_id: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .delete(self.url(&format!("/projects/{project_id}/slide")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Rename echoes the current prompt/context, matching the store's
    /// update contract.
    pub async fn rename_project(
        &self,
        project_id: &str,
        name: &str,
        prompt: &str,
        slide_context: &str,
    ) -> Result<(), SyncError> {
        let response = self
            .http
            .patch(self.url(&format!("/projects/{project_id}")))
            .bearer_auth(&self.token)
            .json(&RenameRequest {
                name,
                prompt,
                slide_context,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .delete(self.url(&format!("/projects/{project_id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_requires_a_credential() {
        let config = ApiConfig::default();
        assert!(matches!(RemoteStore::new(&config), Err(SyncError::Auth)));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let mut config = ApiConfig::default();
        config.base_url = "http://api.local/".into();
        config.set_token("t");
        let store = RemoteStore::new(&config).unwrap();
        assert_eq!(store.url("/projects"), "http://api.local/projects");
    }

    #[test]
    fn data_url_encoding_is_png_base64() {
        let url = encode_image_data_url(&[0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn remote_detail_decodes_store_fields() {
        let raw = r#"{
            "id": "p1",
            "name": "Deck",
            "created_at": "2025-05-01T09:00:00Z",
            "updated_at": "2025-05-02T09:00:00Z",
            "last_prompt": "a rocket",
            "last_slide_context": "Q2 numbers"
        }"#;
        let detail: RemoteProjectDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.name, "Deck");
        assert_eq!(detail.last_prompt.as_deref(), Some("a rocket"));
    }

    #[test]
    fn remote_summary_tolerates_missing_generation_count() {
        let raw = r#"{
            "id": "p1",
            "name": "Deck",
            "created_at": "2025-05-01T09:00:00Z",
            "updated_at": "2025-05-02T09:00:00Z"
        }"#;
        let summary: RemoteProjectSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(summary.generation_count, 0);
    }
}
