//! Change propagation between the compile engine and the dev server.
//!
//! A change signal sent to the dev server comes straight back as a change
//! callback, so the reloader keeps a pending list of everything it has
//! signaled and swallows the echo. Compiled outputs are mapped back to
//! their sources before recompiling, and the resulting recompiled set is
//! mapped forward again to decide which sibling files to signal.

mod server;

pub use server::WsServer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::compiler::{Compiler, CompilerHost};
use crate::debug;
use crate::diagnostics::Diagnostic;
use crate::engine::Engine;
use crate::freshness::FreshnessCache;
use crate::host::CachingHost;
use crate::resource::ResourceStore;
use crate::utils::{is_resource, normalize_path, source_for_output, with_ext};

/// Outbound signalling surface of the dev server.
pub trait DevServer: Send + Sync + 'static {
    /// Tell connected clients that a served file changed.
    fn mark_changed(&self, path: &Path);
}

/// What a change callback amounted to.
#[derive(Debug)]
pub enum ChangeOutcome {
    /// Echo of a signal we issued ourselves; ignored.
    Suppressed,
    /// File content identical to the last pass; no recompile ran.
    Unchanged,
    Recompiled {
        diagnostics: Vec<Diagnostic>,
        /// Absolute source paths signaled to the dev server, trigger
        /// excluded.
        signaled: Vec<PathBuf>,
    },
}

pub struct Reloader<C, H, S>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
    S: DevServer,
{
    engine: Engine<C, H>,
    server: Arc<S>,
    store: Option<Arc<ResourceStore>>,
    /// Content-hash gate; `None` when sources do not live on disk.
    freshness: Option<FreshnessCache>,
    /// Signals issued but not yet echoed back by the server layer.
    pending: FxHashSet<PathBuf>,
    /// Signaled when a pass rewrites nothing the trigger maps to, so the
    /// client still reloads once.
    fallback: PathBuf,
}

impl<C, H, S> Reloader<C, H, S>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
    S: DevServer,
{
    pub fn new(
        engine: Engine<C, H>,
        server: Arc<S>,
        store: Option<Arc<ResourceStore>>,
        freshness: Option<FreshnessCache>,
        fallback: PathBuf,
    ) -> Self {
        Self {
            engine,
            server,
            store,
            freshness,
            pending: FxHashSet::default(),
            fallback: normalize_path(&fallback),
        }
    }

    pub fn engine(&self) -> &Engine<C, H> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<C, H> {
        &mut self.engine
    }

    /// Signal a path out-of-band (type-check reports, style submissions)
    /// and remember it for echo suppression.
    pub fn signal(&mut self, path: &Path) {
        let path = normalize_path(path);
        self.pending.insert(path.clone());
        self.server.mark_changed(&path);
    }

    /// Handle one change callback from the watcher or the server layer.
    pub async fn on_change(&mut self, path: &Path) -> ChangeOutcome {
        let path = normalize_path(path);
        if self.pending.remove(&path) {
            debug!("reload"; "suppressed echo for {}", path.display());
            return ChangeOutcome::Suppressed;
        }

        // Callbacks for compiled outputs map back to their source.
        let source = if path.extension().is_some_and(|e| e == "js") {
            with_ext(&path, "ts")
        } else {
            path
        };

        if let Some(freshness) = &self.freshness
            && !freshness.changed(&source)
        {
            debug!("reload"; "content unchanged for {}", source.display());
            return ChangeOutcome::Unchanged;
        }

        // A changed style invalidates its preprocessed copy before the
        // compile pass re-requests it.
        if is_resource(&source)
            && let Some(store) = &self.store
        {
            store.purge(Some(&source));
        }

        let outcome = self.engine.recompile(&[source.clone()]).await;

        let signaled: Vec<PathBuf> = if outcome.recompiled.is_empty() {
            // Nothing was rewritten; nudge the client through the fallback
            // file so the change is not silently dropped.
            vec![self.fallback.clone()]
        } else {
            // Keep .js outputs (maps and friends have no source of their
            // own), map each back to its source and drop the trigger: the
            // server layer already reloads the file it reported.
            let source_root = self.engine.options().source_root.clone();
            outcome
                .recompiled
                .iter()
                .filter(|rel| rel.extension().is_some_and(|e| e == "js"))
                .map(|rel| normalize_path(&source_for_output(&source_root, rel)))
                .filter(|owner| *owner != source)
                .collect()
        };

        for path in &signaled {
            self.pending.insert(path.clone());
            self.server.mark_changed(path);
        }

        ChangeOutcome::Recompiled {
            diagnostics: outcome.diagnostics,
            signaled,
        }
    }
}
