//! Remote store adapter and cache-or-fetch coordinator for Appcell.
//!
//! Every read and write between the application and the remote document
//! store goes through the [`SyncCoordinator`], which decides between
//! serving from the local cache and fetching, keeps the cache converged
//! with the remote on save, and cascades invalidation on delete.
//!
//! # Components
//!
//! - **RemoteStore**: thin typed interface to the hierarchical remote store
//!   (folders and files), with a Drive-v3-shaped HTTP implementation
//! - **AccessTokenProvider**: seam to the external auth module; this crate
//!   never runs an OAuth flow itself
//! - **SyncCoordinator**: per-document-kind load/save/create/remove with
//!   force-refresh, read-your-writes, and cascading invalidation
//!
//! No call here is retried or given a backoff: remote failures propagate to
//! the caller, which owns the decision to retry or alert the user.

pub mod coordinator;
pub mod remote;

mod error;

pub use coordinator::{SyncConfig, SyncCoordinator, Synced};
pub use error::{SyncError, SyncResult};
pub use remote::{
    AccessTokenProvider, DocumentKind, DocumentRef, DriveConfig, DriveStore, RemoteStore,
    StaticToken,
};
