//! Resource rendezvous store.
//!
//! The compile engine and the host's transform stage run on independent,
//! unordered triggers: the engine needs a preprocessed style while loading
//! the program structure, and the transform stage produces that style only
//! when the host server fetches the resource. The store matches the two up:
//!
//! - a pending-request table maps each compiled-style path to its cached
//!   content plus the callbacks parked on it
//! - a separate notification channel announces "someone wants this resource
//!   fetched" so the host can force the transform stage to run
//!
//! The store is constructed once by the top-level assembly and injected by
//! reference into every consumer; it is not a module-level global.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};

use crate::utils::{compiled_style_name, normalize_path};

#[derive(Default)]
struct StyleLookup {
    content: Option<String>,
    waiters: Vec<oneshot::Sender<String>>,
}

/// Request/response matching table for preprocessed resources.
pub struct ResourceStore {
    lookups: Mutex<FxHashMap<PathBuf, StyleLookup>>,
    notify: Mutex<Option<mpsc::UnboundedSender<PathBuf>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self {
            lookups: Mutex::new(FxHashMap::default()),
            notify: Mutex::new(None),
        }
    }

    /// Register the external consumer of "request" announcements.
    ///
    /// Replaces any previous subscription; the returned receiver yields the
    /// raw (un-normalized-extension) path of every resource some compile
    /// pass is waiting for.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PathBuf> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.notify.lock() = Some(tx);
        rx
    }

    /// True iff an external consumer is registered for request
    /// announcements. Callers fall back to direct reads otherwise.
    pub fn has_listener(&self) -> bool {
        self.notify
            .lock()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Await the preprocessed content for a style path.
    ///
    /// Resolves immediately from cache when possible; otherwise announces
    /// the request and parks until [`submit_style`](Self::submit_style)
    /// delivers. Multiple concurrent requesters for one path all resolve
    /// from a single submission.
    pub async fn request_style(&self, path: &Path) -> anyhow::Result<String> {
        let key = compiled_style_name(path);

        let rx = {
            let mut lookups = self.lookups.lock();
            let lookup = lookups.entry(key).or_default();
            if let Some(content) = &lookup.content {
                return Ok(content.clone());
            }
            let (tx, rx) = oneshot::channel();
            lookup.waiters.push(tx);
            rx
        };

        // Announce only on a miss; a cached hit must not re-trigger the
        // transform stage.
        if let Some(tx) = self.notify.lock().as_ref() {
            let _ = tx.send(normalize_path(path));
        }

        rx.await
            .map_err(|_| anyhow::anyhow!("resource store dropped while waiting for {}", path.display()))
    }

    /// Deliver preprocessed content, waking every parked requester exactly
    /// once. Later requesters resolve immediately from the stored content.
    pub fn submit_style(&self, path: &Path, content: &str) {
        let key = compiled_style_name(path);
        let mut lookups = self.lookups.lock();
        let lookup = lookups.entry(key).or_default();
        lookup.content = Some(content.to_string());
        for waiter in lookup.waiters.drain(..) {
            let _ = waiter.send(content.to_string());
        }
    }

    /// Clear cached content for one path, or for all paths when `None`.
    ///
    /// The next requester suspends again until fresh content is submitted.
    /// Parked waiters are kept - only the cache is dropped.
    pub fn purge(&self, path: Option<&Path>) {
        let mut lookups = self.lookups.lock();
        match path {
            Some(path) => {
                if let Some(lookup) = lookups.get_mut(&compiled_style_name(path)) {
                    lookup.content = None;
                }
            }
            None => {
                for lookup in lookups.values_mut() {
                    lookup.content = None;
                }
            }
        }
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}
