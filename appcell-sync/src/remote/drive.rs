//! Drive-v3-shaped HTTP implementation of the remote store.

use super::{AccessTokenProvider, DocumentKind, DocumentRef, RemoteStore};
use crate::error::{SyncError, SyncResult};
use appcell_types::DocumentId;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Configuration for the Drive store adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Base URL for the store API (e.g. `https://www.googleapis.com`).
    /// Tests point this at a local mock server.
    pub api_base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Drive API response structures.
#[derive(Debug, Deserialize)]
struct DriveFileList {
    files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

impl DriveFile {
    fn into_ref(self) -> DocumentRef {
        let kind = if self.mime_type == FOLDER_MIME {
            DocumentKind::Folder
        } else {
            DocumentKind::File
        };
        DocumentRef {
            id: DocumentId::new(self.id),
            name: self.name,
            kind,
        }
    }
}

/// Remote store backed by a Drive-v3-shaped HTTP API.
pub struct DriveStore {
    config: DriveConfig,
    client: Client,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl DriveStore {
    /// Creates a new store adapter with the given credential source.
    pub fn new(config: DriveConfig, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            tokens,
        }
    }

    /// Fails fast when the external auth module has no credential.
    fn bearer(&self) -> SyncResult<String> {
        self.tokens.token().ok_or(SyncError::AuthenticationMissing)
    }

    async fn check(response: reqwest::Response) -> SyncResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SyncError::RemoteStore {
            status: status.as_u16(),
            message,
        })
    }

    async fn query_files(&self, query: &str) -> SyncResult<Vec<DriveFile>> {
        let token = self.bearer()?;
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/drive/v3/files", self.config.api_base_url))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("fields", "nextPageToken,files(id,name,mimeType)"),
                    ("pageSize", "100"),
                ]);

            if let Some(tok) = &page_token {
                request = request.query(&[("pageToken", tok.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SyncError::Network(format!("file query failed: {e}")))?;
            let response = Self::check(response).await?;

            let list: DriveFileList = response
                .json()
                .await
                .map_err(|e| SyncError::Network(format!("failed to parse file list: {e}")))?;

            all.extend(list.files);
            page_token = list.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(all)
    }
}

/// Escapes a value for interpolation into a Drive query string literal.
/// Session names are user-controlled, so `'` and `\` must not terminate
/// the literal early.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl RemoteStore for DriveStore {
    async fn find(&self, parent: &DocumentId, name: &str) -> SyncResult<Option<DocumentRef>> {
        let query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            escape_query(parent.as_str())
        );
        let files = self.query_files(&query).await?;
        Ok(files.into_iter().next().map(DriveFile::into_ref))
    }

    async fn create_folder(&self, parent: &DocumentId, name: &str) -> SyncResult<DocumentRef> {
        let token = self.bearer()?;
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent.as_str()]
        });

        let response = self
            .client
            .post(format!("{}/drive/v3/files", self.config.api_base_url))
            .bearer_auth(&token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("folder creation failed: {e}")))?;
        let response = Self::check(response).await?;

        let created: DriveFile = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse created folder: {e}")))?;

        info!("created remote folder {name} (id: {})", created.id);
        Ok(created.into_ref())
    }

    async fn create_file(
        &self,
        parent: &DocumentId,
        name: &str,
        content: &[u8],
    ) -> SyncResult<DocumentRef> {
        let token = self.bearer()?;

        debug!("uploading file {name} ({} bytes)", content.len());

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent.as_str()]
        });

        // Hand-built multipart body: String concatenation would corrupt
        // binary content.
        let boundary = "appcell_boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());

        let response = self
            .client
            .post(format!(
                "{}/upload/drive/v3/files?uploadType=multipart",
                self.config.api_base_url
            ))
            .bearer_auth(&token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("upload failed: {e}")))?;
        let response = Self::check(response).await?;

        let created: DriveFile = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse upload response: {e}")))?;

        info!("created remote file {name} (id: {})", created.id);
        Ok(created.into_ref())
    }

    async fn read(&self, id: &DocumentId) -> SyncResult<Vec<u8>> {
        let token = self.bearer()?;

        debug!("reading remote file {id}");

        let response = self
            .client
            .get(format!(
                "{}/drive/v3/files/{id}?alt=media",
                self.config.api_base_url
            ))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("read failed: {e}")))?;
        let response = Self::check(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Network(format!("read body failed: {e}")))?;

        Ok(bytes.to_vec())
    }

    async fn update(&self, id: &DocumentId, content: &[u8]) -> SyncResult<()> {
        let token = self.bearer()?;

        debug!("updating remote file {id} ({} bytes)", content.len());

        let response = self
            .client
            .patch(format!(
                "{}/upload/drive/v3/files/{id}?uploadType=media",
                self.config.api_base_url
            ))
            .bearer_auth(&token)
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("update failed: {e}")))?;
        Self::check(response).await?;

        Ok(())
    }

    async fn set_trashed(&self, id: &DocumentId) -> SyncResult<()> {
        let token = self.bearer()?;

        let response = self
            .client
            .patch(format!("{}/drive/v3/files/{id}", self.config.api_base_url))
            .bearer_auth(&token)
            .json(&serde_json::json!({"trashed": true}))
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("trash failed: {e}")))?;
        Self::check(response).await?;

        info!("trashed remote document {id}");
        Ok(())
    }

    async fn list(&self, parent: &DocumentId) -> SyncResult<Vec<DocumentRef>> {
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query(parent.as_str())
        );
        let files = self.query_files(&query).await?;
        Ok(files.into_iter().map(DriveFile::into_ref).collect())
    }
}
