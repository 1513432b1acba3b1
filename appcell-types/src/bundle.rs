//! The app bundle document model.
//!
//! An app bundle is the triple of manifest, parameter values, and HTML
//! content identifying one micro-application. All three live as separate
//! files under the bundle's folder in the remote store.

use crate::DocumentId;
use serde::{Deserialize, Serialize};

/// Parameter map: named, JSON-valued settings a bundle exposes.
pub type ParamMap = serde_json::Map<String, serde_json::Value>;

/// Session data schema declared by a bundle's manifest.
/// Opaque to the core; validated (if at all) by the guest itself.
pub type Schema = serde_json::Value;

/// Bundle manifest, stored as `manifest.json` in the bundle folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Human-readable bundle name.
    pub name: String,
    /// Bundle version string.
    pub version: String,
    /// Declared parameters with their default values.
    #[serde(default)]
    pub params: ParamMap,
    /// Schema for the session `data` payload.
    #[serde(default, rename = "sessionSchema")]
    pub session_schema: Schema,
}

/// One micro-application: manifest + effective params + HTML content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppBundle {
    /// The bundle folder's id in the remote store.
    pub id: DocumentId,
    /// Parsed manifest.
    pub manifest: Manifest,
    /// Effective parameter values (manifest defaults overlaid with user edits).
    #[serde(default)]
    pub params: ParamMap,
    /// The guest HTML document, rendered verbatim into the sandbox.
    pub html: String,
}
