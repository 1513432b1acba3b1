//! Cache-or-fetch orchestration.
//!
//! The coordinator mediates every read and write between the application and
//! the remote store. Reads serve from the local cache unless forced; writes
//! go remote-first and only update the cache on success, so a later
//! non-forced load observes the just-saved value (read-your-writes) and a
//! failed save never poisons the cache with an unpersisted value.
//!
//! Remote layout: a root folder holds one folder per app bundle, containing
//! `manifest.json`, `params.json`, `index.html`, and a `sessions` subfolder
//! with one JSON file per session. Folder and file ids are stable for the
//! life of a document, so id lookups are cached indefinitely.

use crate::error::{SyncError, SyncResult};
use crate::remote::{DocumentKind, RemoteStore};
use appcell_cache::LocalCache;
use appcell_types::{
    AppBundle, DocumentId, Manifest, ParamMap, SessionRecord, SessionSummary, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const MANIFEST_FILE: &str = "manifest.json";
const PARAMS_FILE: &str = "params.json";
const HTML_FILE: &str = "index.html";
const SESSIONS_FOLDER: &str = "sessions";
const ROOT_KEY: &str = "root";

/// Configuration for the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Name of the root folder that holds all app bundle folders.
    pub root_folder_name: String,
    /// Parent under which the root folder lives (`"root"` = the store's
    /// top level).
    pub root_parent: DocumentId,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root_folder_name: "Appcell".to_string(),
            root_parent: DocumentId::new("root"),
        }
    }
}

/// A document annotated with the time it was last synchronized, for
/// freshness display. On a cache hit this is the entry's `cached_at`; on a
/// fetch it is the fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Synced<T> {
    /// The document.
    pub doc: T,
    /// When the returned value was last fetched from or saved to the
    /// remote store.
    pub sync_time: Timestamp,
}

impl<T> Synced<T> {
    /// Freshness label for display, e.g. `"just now"` or `"2m ago"`.
    #[must_use]
    pub fn freshness(&self, now: Timestamp) -> String {
        appcell_types::format_age(self.sync_time.elapsed_until(now))
    }
}

/// On-disk session file content. The session's id is the file's id in the
/// remote store, so the body never embeds it.
#[derive(Debug, Serialize, Deserialize)]
struct SessionBody {
    name: String,
    #[serde(rename = "createdAt")]
    created_at: Timestamp,
    #[serde(default)]
    data: serde_json::Value,
}

impl SessionBody {
    fn of(record: &SessionRecord) -> Self {
        Self {
            name: record.name.clone(),
            created_at: record.created_at,
            data: record.data.clone(),
        }
    }

    fn into_record(self, id: DocumentId) -> SessionRecord {
        SessionRecord {
            id,
            name: self.name,
            created_at: self.created_at,
            data: self.data,
        }
    }
}

/// Orchestrates cache-or-fetch decisions, force-refresh, and cascading
/// invalidation for app bundles and sessions.
///
/// Dependencies are injected explicitly so tests can supply fakes and
/// multiple independent caches can coexist.
pub struct SyncCoordinator {
    store: Arc<dyn RemoteStore>,
    cache: RwLock<LocalCache>,
    config: SyncConfig,
}

impl SyncCoordinator {
    /// Creates a coordinator over the given store and cache.
    pub fn new(store: Arc<dyn RemoteStore>, cache: LocalCache, config: SyncConfig) -> Self {
        Self {
            store,
            cache: RwLock::new(cache),
            config,
        }
    }

    // ── App bundles ─────────────────────────────────────────────

    /// Loads a bundle, serving from cache unless `force_refresh`.
    pub async fn load_app(
        &self,
        id: &DocumentId,
        force_refresh: bool,
    ) -> SyncResult<Synced<AppBundle>> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get_app(id) {
                debug!("bundle {id} served from cache");
                return Ok(Synced {
                    doc: entry.value.clone(),
                    sync_time: entry.cached_at,
                });
            }
        }

        debug!("fetching bundle {id} from remote store");
        let bundle = self.fetch_app(id).await?;
        let now = Timestamp::now();
        self.cache.write().await.put_app_at(bundle.clone(), now);
        Ok(Synced {
            doc: bundle,
            sync_time: now,
        })
    }

    /// Saves a bundle's files remote-first; the cache is updated only after
    /// every remote write succeeded.
    pub async fn save_app(&self, bundle: &AppBundle) -> SyncResult<()> {
        self.write_app_file(
            &bundle.id,
            MANIFEST_FILE,
            &serde_json::to_vec(&bundle.manifest)?,
        )
        .await?;
        self.write_app_file(&bundle.id, PARAMS_FILE, &serde_json::to_vec(&bundle.params)?)
            .await?;
        self.write_app_file(&bundle.id, HTML_FILE, bundle.html.as_bytes())
            .await?;

        self.cache
            .write()
            .await
            .put_app_at(bundle.clone(), Timestamp::now());
        info!("saved bundle {}", bundle.id);
        Ok(())
    }

    /// Creates a new bundle: folder plus the three content files, then seeds
    /// the cache for the generated id.
    pub async fn create_app(
        &self,
        manifest: Manifest,
        params: ParamMap,
        html: String,
    ) -> SyncResult<AppBundle> {
        let root = self.root_folder_id().await?;
        let folder = self.store.create_folder(&root, &manifest.name).await?;
        let app_id = folder.id;

        let manifest_ref = self
            .store
            .create_file(&app_id, MANIFEST_FILE, &serde_json::to_vec(&manifest)?)
            .await?;
        let params_ref = self
            .store
            .create_file(&app_id, PARAMS_FILE, &serde_json::to_vec(&params)?)
            .await?;
        let html_ref = self
            .store
            .create_file(&app_id, HTML_FILE, html.as_bytes())
            .await?;

        let bundle = AppBundle {
            id: app_id.clone(),
            manifest,
            params,
            html,
        };

        let mut cache = self.cache.write().await;
        cache.put_typed(file_key(&app_id, MANIFEST_FILE), &manifest_ref.id);
        cache.put_typed(file_key(&app_id, PARAMS_FILE), &params_ref.id);
        cache.put_typed(file_key(&app_id, HTML_FILE), &html_ref.id);
        cache.put_app(bundle.clone());

        info!("created bundle {} ({})", bundle.manifest.name, bundle.id);
        Ok(bundle)
    }

    /// Trashes a bundle remotely, then cascades invalidation across every
    /// cache entry rooted at its id: the bundle itself, folder and file id
    /// lookups, the session list, and each cached session document.
    pub async fn remove_app(&self, id: &DocumentId) -> SyncResult<()> {
        self.store.set_trashed(id).await?;

        let mut cache = self.cache.write().await;
        cache.invalidate_app(id);
        cache.invalidate_prefix(&format!("{id}:"));

        info!("removed bundle {id}");
        Ok(())
    }

    // ── Sessions ────────────────────────────────────────────────

    /// Lists a bundle's sessions, serving from cache unless `force_refresh`.
    pub async fn list_sessions(
        &self,
        app_id: &DocumentId,
        force_refresh: bool,
    ) -> SyncResult<Synced<Vec<SessionSummary>>> {
        let key = session_list_key(app_id);
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get_typed::<Vec<SessionSummary>>(&key) {
                return Ok(Synced {
                    doc: entry.value,
                    sync_time: entry.cached_at,
                });
            }
        }

        let folder = self.sessions_folder_id(app_id).await?;
        let summaries: Vec<SessionSummary> = self
            .store
            .list(&folder)
            .await?
            .into_iter()
            .filter(|doc| doc.kind == DocumentKind::File)
            .map(|doc| {
                let name = doc
                    .name
                    .strip_suffix(".json")
                    .unwrap_or(&doc.name)
                    .to_string();
                SessionSummary { id: doc.id, name }
            })
            .collect();

        let now = Timestamp::now();
        self.cache
            .write()
            .await
            .put_typed_at(key, &summaries, now);
        Ok(Synced {
            doc: summaries,
            sync_time: now,
        })
    }

    /// Loads one session, serving from cache unless `force_refresh`.
    pub async fn load_session(
        &self,
        app_id: &DocumentId,
        session_id: &DocumentId,
        force_refresh: bool,
    ) -> SyncResult<Synced<SessionRecord>> {
        let key = session_key(app_id, session_id);
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get_typed::<SessionRecord>(&key) {
                debug!("session {session_id} served from cache");
                return Ok(Synced {
                    doc: entry.value,
                    sync_time: entry.cached_at,
                });
            }
        }

        let bytes = self.store.read(session_id).await?;
        let body: SessionBody = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::MalformedDocument(format!("session {session_id}: {e}")))?;
        let record = body.into_record(session_id.clone());

        let now = Timestamp::now();
        self.cache.write().await.put_typed_at(key, &record, now);
        Ok(Synced {
            doc: record,
            sync_time: now,
        })
    }

    /// Saves a session remote-first; the cache entry is refreshed only on
    /// success.
    pub async fn save_session(
        &self,
        app_id: &DocumentId,
        record: &SessionRecord,
    ) -> SyncResult<()> {
        let bytes = serde_json::to_vec(&SessionBody::of(record))?;
        self.store.update(&record.id, &bytes).await?;

        self.cache.write().await.put_typed_at(
            session_key(app_id, &record.id),
            record,
            Timestamp::now(),
        );
        info!("saved session {} for bundle {app_id}", record.id);
        Ok(())
    }

    /// Allocates a new session document, then seeds the cache for its
    /// generated id (and the session list, if one is cached).
    pub async fn create_session(
        &self,
        app_id: &DocumentId,
        name: &str,
        data: serde_json::Value,
    ) -> SyncResult<SessionRecord> {
        let folder = self.sessions_folder_id(app_id).await?;
        let body = SessionBody {
            name: name.to_string(),
            created_at: Timestamp::now(),
            data,
        };
        let doc = self
            .store
            .create_file(&folder, &format!("{name}.json"), &serde_json::to_vec(&body)?)
            .await?;
        let record = body.into_record(doc.id);

        let mut cache = self.cache.write().await;
        cache.put_typed(session_key(app_id, &record.id), &record);
        let list_key = session_list_key(app_id);
        if let Some(mut list) = cache.get_typed::<Vec<SessionSummary>>(&list_key) {
            list.value.push(SessionSummary {
                id: record.id.clone(),
                name: record.name.clone(),
            });
            cache.put_typed(list_key, &list.value);
        }

        info!("created session {} for bundle {app_id}", record.id);
        Ok(record)
    }

    // ── Id resolution ───────────────────────────────────────────

    /// Resolves the root folder, creating it on first use. Cached forever:
    /// the id is stable for the life of the remote folder.
    async fn root_folder_id(&self) -> SyncResult<DocumentId> {
        if let Some(entry) = self.cache.read().await.get_typed::<DocumentId>(ROOT_KEY) {
            return Ok(entry.value);
        }

        let id = match self
            .store
            .find(&self.config.root_parent, &self.config.root_folder_name)
            .await?
        {
            Some(doc) => doc.id,
            None => {
                self.store
                    .create_folder(&self.config.root_parent, &self.config.root_folder_name)
                    .await?
                    .id
            }
        };

        self.cache.write().await.put_typed(ROOT_KEY, &id);
        Ok(id)
    }

    /// Resolves a bundle's `sessions` subfolder, creating it on first use.
    async fn sessions_folder_id(&self, app_id: &DocumentId) -> SyncResult<DocumentId> {
        let key = sessions_folder_key(app_id);
        if let Some(entry) = self.cache.read().await.get_typed::<DocumentId>(&key) {
            return Ok(entry.value);
        }

        let id = match self.store.find(app_id, SESSIONS_FOLDER).await? {
            Some(doc) => doc.id,
            None => self.store.create_folder(app_id, SESSIONS_FOLDER).await?.id,
        };

        self.cache.write().await.put_typed(key, &id);
        Ok(id)
    }

    /// Resolves a content file's id within a bundle folder, if it exists.
    async fn try_file_id(
        &self,
        app_id: &DocumentId,
        name: &str,
    ) -> SyncResult<Option<DocumentId>> {
        let key = file_key(app_id, name);
        if let Some(entry) = self.cache.read().await.get_typed::<DocumentId>(&key) {
            return Ok(Some(entry.value));
        }

        match self.store.find(app_id, name).await? {
            Some(doc) => {
                self.cache.write().await.put_typed(key, &doc.id);
                Ok(Some(doc.id))
            }
            None => Ok(None),
        }
    }

    async fn file_id(&self, app_id: &DocumentId, name: &str) -> SyncResult<DocumentId> {
        self.try_file_id(app_id, name)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("{name} under bundle {app_id}")))
    }

    async fn fetch_app(&self, id: &DocumentId) -> SyncResult<AppBundle> {
        let manifest_id = self.file_id(id, MANIFEST_FILE).await?;
        let manifest: Manifest = serde_json::from_slice(&self.store.read(&manifest_id).await?)
            .map_err(|e| SyncError::MalformedDocument(format!("{MANIFEST_FILE}: {e}")))?;

        // A bundle saved before any param edit may have no params file yet.
        let params: ParamMap = match self.try_file_id(id, PARAMS_FILE).await? {
            Some(file) => serde_json::from_slice(&self.store.read(&file).await?)
                .map_err(|e| SyncError::MalformedDocument(format!("{PARAMS_FILE}: {e}")))?,
            None => ParamMap::new(),
        };

        let html_id = self.file_id(id, HTML_FILE).await?;
        let html = String::from_utf8(self.store.read(&html_id).await?)
            .map_err(|_| SyncError::MalformedDocument(format!("{HTML_FILE} is not valid UTF-8")))?;

        Ok(AppBundle {
            id: id.clone(),
            manifest,
            params,
            html,
        })
    }

    /// Updates a bundle file, creating it if the bundle predates the file.
    async fn write_app_file(
        &self,
        app_id: &DocumentId,
        name: &str,
        content: &[u8],
    ) -> SyncResult<()> {
        match self.try_file_id(app_id, name).await? {
            Some(file) => self.store.update(&file, content).await,
            None => {
                let doc = self.store.create_file(app_id, name, content).await?;
                self.cache
                    .write()
                    .await
                    .put_typed(file_key(app_id, name), &doc.id);
                Ok(())
            }
        }
    }
}

fn file_key(app_id: &DocumentId, name: &str) -> String {
    format!("{app_id}:file:{name}")
}

fn sessions_folder_key(app_id: &DocumentId) -> String {
    format!("{app_id}:folder:{SESSIONS_FOLDER}")
}

fn session_list_key(app_id: &DocumentId) -> String {
    format!("{app_id}:sessions")
}

fn session_key(app_id: &DocumentId, session_id: &DocumentId) -> String {
    format!("{app_id}:session:{session_id}")
}
