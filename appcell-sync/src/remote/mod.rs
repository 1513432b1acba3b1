//! Remote document store abstraction.
//!
//! Defines the typed interface to the hierarchical remote store (files
//! grouped under folders) plus the credential seam. The store is consumed,
//! not redesigned: its folder/file CRUD semantics are whatever the provider
//! implements.

mod drive;

pub use drive::{DriveConfig, DriveStore};

use crate::error::SyncResult;
use appcell_types::DocumentId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether a remote document is a folder or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Folder,
    File,
}

/// A reference to a remote document, as returned by lookups and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Store-assigned id.
    pub id: DocumentId,
    /// Document name within its parent folder.
    pub name: String,
    /// Folder or file.
    pub kind: DocumentKind,
}

/// Abstract remote document store.
///
/// All calls require a bearer credential from the external auth module;
/// without one they fail fast with
/// [`SyncError::AuthenticationMissing`](crate::SyncError::AuthenticationMissing)
/// before any network attempt.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Looks up a child document by name under a parent folder.
    async fn find(&self, parent: &DocumentId, name: &str) -> SyncResult<Option<DocumentRef>>;

    /// Creates a folder under the parent.
    async fn create_folder(&self, parent: &DocumentId, name: &str) -> SyncResult<DocumentRef>;

    /// Creates a file with the given content under the parent.
    async fn create_file(
        &self,
        parent: &DocumentId,
        name: &str,
        content: &[u8],
    ) -> SyncResult<DocumentRef>;

    /// Reads a file's raw content.
    async fn read(&self, id: &DocumentId) -> SyncResult<Vec<u8>>;

    /// Replaces a file's content.
    async fn update(&self, id: &DocumentId, content: &[u8]) -> SyncResult<()>;

    /// Moves a document (and, for folders, its subtree) to the trash.
    async fn set_trashed(&self, id: &DocumentId) -> SyncResult<()>;

    /// Lists the direct, non-trashed children of a folder.
    async fn list(&self, parent: &DocumentId) -> SyncResult<Vec<DocumentRef>>;
}

/// Supplies the bearer credential owned by the external auth module.
///
/// The sync core only reads the token; acquisition, refresh, and storage
/// happen elsewhere.
pub trait AccessTokenProvider: Send + Sync {
    /// Returns the current bearer token, or `None` if not authenticated.
    fn token(&self) -> Option<String>;
}

/// Fixed-token provider for tests and short-lived tools.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl AccessTokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
