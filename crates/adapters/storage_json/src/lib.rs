//! # rulehub-adapter-storage-json
//!
//! JSON file persistence adapter — implements the `AutomationStore` port
//! defined in `rulehub-app` over a single versioned document.
//!
//! ## Contract
//! - A missing or malformed file reads as "no automations", never an error.
//! - Writes go to a temporary path, the old file is removed, and the
//!   temporary is renamed into place. A failed rename falls back to a
//!   direct overwrite, which is not crash-atomic — an accepted tradeoff.
//! - New ids come from a coarse clock perturbed by bounded randomness;
//!   duplicates are resolved after the fact by [`JsonFileStore::sanitize`].
//! - Deletes use targeted array surgery on the raw text, or rewrite the
//!   array empty when the last entry goes.
//! - A process-wide lock serializes every load→modify→write sequence so a
//!   scheduler pass never interleaves with a concurrent edit.

mod stream;

pub use stream::stream_parse;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use rulehub_app::ports::AutomationStore;
use rulehub_domain::automation::{Automation, AutomationDocument};
use rulehub_domain::error::{HubError, NotFoundError, StorageError};
use rulehub_domain::id::AutomationId;

/// Bound on id-collision retries before accepting the last candidate.
const ID_RETRY_LIMIT: u32 = 100;

/// File-backed automation store.
///
/// Clones share the same path and the same process-wide lock, so every
/// handle participates in the mutual-exclusion discipline.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    tmp_path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store over the document at `path`. The file does not need
    /// to exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tmp_path = path.with_extension("tmp");
        Self {
            inner: Arc::new(StoreInner {
                path,
                tmp_path,
                lock: Mutex::new(()),
            }),
        }
    }

    /// The path of the persisted document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Tolerant read: missing or malformed input is an empty document.
    fn read_document(&self) -> AutomationDocument {
        match fs::read_to_string(&self.inner.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(path = %self.inner.path.display(), error = %err, "malformed store; treating as empty");
                AutomationDocument::default()
            }),
            Err(_) => AutomationDocument::default(),
        }
    }

    fn write_document(&self, doc: &AutomationDocument) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(doc).map_err(|_| StorageError::Malformed)?;
        self.write_text(&text)
    }

    /// Atomic write: temp file, remove final, rename temp into place.
    fn write_text(&self, text: &str) -> Result<(), StorageError> {
        fs::write(&self.inner.tmp_path, text).map_err(StorageError::Write)?;
        promote(&self.inner.tmp_path, &self.inner.path, text)
    }
}

/// Promote `tmp` to `path`. When the rename fails, fall back to writing
/// `path` directly — not crash-atomic, but the new content still lands.
fn promote(tmp: &Path, path: &Path, text: &str) -> Result<(), StorageError> {
    let _ = fs::remove_file(path);
    if fs::rename(tmp, path).is_err() {
        warn!(path = %path.display(), "rename failed; falling back to direct write");
        return fs::write(path, text).map_err(StorageError::Write);
    }
    Ok(())
}

/// Pick an id not present in `doc`: coarse clock seconds, perturbed by
/// `1 + random(1..100000)` while it collides, bounded to
/// [`ID_RETRY_LIMIT`] attempts.
fn unique_id_in(doc: &AutomationDocument) -> AutomationId {
    let mut rng = rand::thread_rng();
    let mut candidate = Utc::now().timestamp();
    let mut guard = 0;
    while doc.contains_id(AutomationId::new(candidate)) && guard < ID_RETRY_LIMIT {
        candidate += 1 + rng.gen_range(1..100_000);
        guard += 1;
    }
    AutomationId::new(candidate)
}

/// Resolve duplicate ids in place using the same perturbation scheme as id
/// generation. Returns whether anything changed; a clean document is left
/// untouched.
fn sanitize_document(doc: &mut AutomationDocument) -> bool {
    let mut rng = rand::thread_rng();
    let mut seen: Vec<i64> = Vec::new();
    let mut changed = false;
    for auto in &mut doc.automations {
        let raw = auto.id.as_i64();
        if !seen.contains(&raw) {
            seen.push(raw);
            continue;
        }
        let mut candidate = Utc::now().timestamp();
        let mut guard = 0;
        while seen.contains(&candidate) && guard < ID_RETRY_LIMIT {
            candidate += 1 + rng.gen_range(1..100_000);
            guard += 1;
        }
        warn!(old = raw, new = candidate, "replaced duplicate automation id");
        auto.id = AutomationId::new(candidate);
        seen.push(candidate);
        changed = true;
    }
    changed
}

/// Locate `"id": <id>` in the raw text, tolerating the compact form and
/// refusing to match a longer number's prefix.
fn find_id_position(text: &str, id: AutomationId) -> Option<usize> {
    for needle in [format!("\"id\": {id}"), format!("\"id\":{id}")] {
        let mut from = 0;
        while let Some(rel) = text[from..].find(&needle) {
            let pos = from + rel;
            let after = pos + needle.len();
            if text.as_bytes().get(after).is_none_or(|b| !b.is_ascii_digit()) {
                return Some(pos);
            }
            from = after;
        }
    }
    None
}

/// Bounds of the automations array: index of `[` and of its matching `]`.
fn automations_array_bounds(text: &str) -> Option<(usize, usize)> {
    let key = text.find("\"automations\"")?;
    let open = key + text[key..].find('[')?;
    let mut depth = 0_usize;
    for (offset, byte) in text.bytes().enumerate().skip(open) {
        if byte == b'[' {
            depth += 1;
        } else if byte == b']' {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some((open, offset));
            }
        }
    }
    None
}

fn not_found(id: AutomationId) -> HubError {
    NotFoundError {
        entity: "Automation",
        id: id.to_string(),
    }
    .into()
}

impl AutomationStore for JsonFileStore {
    async fn load(&self) -> Result<AutomationDocument, HubError> {
        let _guard = self.inner.lock.lock().await;
        Ok(self.read_document())
    }

    async fn replace(&self, doc: &AutomationDocument) -> Result<(), HubError> {
        let _guard = self.inner.lock.lock().await;
        self.write_document(doc)?;
        Ok(())
    }

    async fn for_each_raw(
        &self,
        visit: &mut (dyn FnMut(&str) -> bool + Send),
    ) -> Result<(), HubError> {
        let _guard = self.inner.lock.lock().await;
        stream::stream_parse(&self.inner.path, visit)?;
        Ok(())
    }

    async fn update_next_at(
        &self,
        id: AutomationId,
        next_at: Option<i64>,
    ) -> Result<(), HubError> {
        let _guard = self.inner.lock.lock().await;
        let mut doc = self.read_document();
        let auto = doc
            .automations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found(id))?;
        auto.next_at = next_at;
        debug!(id = %id, next_at = ?next_at, "persisted next run time");
        self.write_document(&doc)?;
        Ok(())
    }

    async fn append(&self, automation: Automation) -> Result<(), HubError> {
        let _guard = self.inner.lock.lock().await;
        let mut doc = self.read_document();
        doc.automations.push(automation);
        self.write_document(&doc)?;
        Ok(())
    }

    /// Targeted array surgery on the raw text; the array is rewritten empty
    /// when the last entry goes.
    async fn remove(&self, id: AutomationId) -> Result<(), HubError> {
        let _guard = self.inner.lock.lock().await;
        let text = match fs::read_to_string(&self.inner.path) {
            Ok(text) => text,
            Err(_) => return Err(not_found(id)),
        };
        let id_pos = find_id_position(&text, id).ok_or_else(|| not_found(id))?;
        let (arr_start, arr_end) =
            automations_array_bounds(&text).ok_or(StorageError::Malformed)?;
        let obj_start = text[..id_pos].rfind('{').ok_or(StorageError::Malformed)?;
        let obj_end =
            stream::find_object_end(&text, obj_start).ok_or(StorageError::Malformed)?;

        let inner = text[arr_start + 1..arr_end].trim();
        let only_object = inner.find('{') == inner.rfind('{');
        let updated = if only_object {
            format!("{}{}", &text[..=arr_start], &text[arr_end..])
        } else {
            let bytes = text.as_bytes();
            let mut del_start = obj_start;
            let mut del_end = obj_end + 1;
            let mut cursor = del_end;
            while cursor < text.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if cursor < text.len() && bytes[cursor] == b',' {
                del_end = cursor + 1;
            } else if let Some(comma) = text[..obj_start].rfind(',') {
                if comma > arr_start {
                    del_start = comma;
                }
            }
            format!("{}{}", &text[..del_start], &text[del_end..])
        };
        self.write_text(&updated)?;
        Ok(())
    }

    async fn set_enabled(&self, id: AutomationId, enabled: bool) -> Result<(), HubError> {
        let _guard = self.inner.lock.lock().await;
        let mut doc = self.read_document();
        let auto = doc
            .automations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found(id))?;
        auto.enabled = enabled;
        self.write_document(&doc)?;
        Ok(())
    }

    async fn sanitize(&self) -> Result<bool, HubError> {
        let _guard = self.inner.lock.lock().await;
        let mut doc = self.read_document();
        let changed = sanitize_document(&mut doc);
        if changed {
            self.write_document(&doc)?;
        }
        Ok(changed)
    }

    async fn unique_id(&self) -> Result<AutomationId, HubError> {
        let _guard = self.inner.lock.lock().await;
        let doc = self.read_document();
        Ok(unique_id_in(&doc))
    }
}
