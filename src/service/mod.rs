//! Compiler service façade.
//!
//! Owns the reload coordinator, the resource store and the type-check
//! worker, and exposes the load path the dev server consumes: built output
//! lookup that surfaces file-attributed errors instead of stale text.
//!
//! Two diagnostic sets are merged on lookup: the last compile pass's
//! structural diagnostics and the latest finished out-of-band type-check
//! report. An edit resets the type-check set until the worker catches up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::compiler::{Compiler, CompilerHost};
use crate::diagnostics::{
    Diagnostic, errors_in_file, files_with_errors, format_diagnostics,
};
use crate::host::CachingHost;
use crate::log;
use crate::reload::{ChangeOutcome, DevServer, Reloader};
use crate::resource::ResourceStore;
use crate::typecheck::{CheckRequest, TypeCheckWorker};
use crate::utils::{is_source, with_ext};

/// Built output for one source file.
#[derive(Debug, Clone)]
pub struct BuiltJs {
    pub code: String,
    pub map: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// The file (or its template) carries error diagnostics; the formatted
    /// text replaces the output.
    #[error("{0}")]
    Diagnostics(String),
    #[error("no built output for {0}")]
    NotBuilt(PathBuf),
}

/// Build gate phases, observable through a watch channel so concurrent
/// tasks can park until the first build lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Pending,
    Building,
    Built,
}

pub struct CompilerService<C, H, S>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
    S: DevServer,
{
    reloader: Reloader<C, H, S>,
    store: Option<Arc<ResourceStore>>,
    typecheck: Option<TypeCheckWorker>,
    gate: watch::Sender<BuildPhase>,
    last_compile: Vec<Diagnostic>,
    last_check: Vec<Diagnostic>,
}

impl<C, H, S> CompilerService<C, H, S>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
    S: DevServer,
{
    pub fn new(
        reloader: Reloader<C, H, S>,
        store: Option<Arc<ResourceStore>>,
        typecheck: Option<TypeCheckWorker>,
    ) -> Self {
        let (gate, _) = watch::channel(BuildPhase::Pending);
        Self {
            reloader,
            store,
            typecheck,
            gate,
            last_compile: Vec::new(),
            last_check: Vec::new(),
        }
    }

    pub fn reloader(&self) -> &Reloader<C, H, S> {
        &self.reloader
    }

    /// Observe the build gate; park on `wait_for(Built)` from other tasks.
    pub fn build_phase(&self) -> watch::Receiver<BuildPhase> {
        self.gate.subscribe()
    }

    /// Run the initial build once; later calls are no-ops. Only one build
    /// is ever in flight, concurrent observers queue on the gate.
    pub async fn ensure_built(&mut self) -> &[Diagnostic] {
        if *self.gate.borrow() == BuildPhase::Built {
            return &self.last_compile;
        }

        self.gate.send_replace(BuildPhase::Building);
        let outcome = self.reloader.engine_mut().compile().await;
        self.last_compile = outcome.diagnostics;
        self.gate.send_replace(BuildPhase::Built);

        if let Some(worker) = &self.typecheck {
            worker.request(CheckRequest::default());
        }
        &self.last_compile
    }

    /// Built output for a source or output path, without error gating.
    pub fn built_file(&self, path: &Path) -> Option<BuiltJs> {
        let output = if is_source(path) {
            with_ext(path, "js")
        } else {
            path.to_path_buf()
        };
        let code = self.reloader.engine().host().built_file(&output)?;
        let map = self
            .reloader
            .engine()
            .host()
            .built_file(&with_ext(&output, "js.map"));
        Some(BuiltJs { code, map })
    }

    /// The dev-server load path. Errors attributed to the file, from either
    /// the last compile or the latest type-check report, are thrown as
    /// formatted text in place of the output.
    pub fn load(&self, path: &Path) -> Result<BuiltJs, LoadError> {
        let source = if path.extension().is_some_and(|e| e == "js") {
            with_ext(path, "ts")
        } else {
            path.to_path_buf()
        };

        let mut errors = errors_in_file(&source, &self.last_compile);
        errors.extend(errors_in_file(&source, &self.last_check));
        if !errors.is_empty() {
            return Err(LoadError::Diagnostics(format_diagnostics(&errors)));
        }

        self.built_file(&source)
            .ok_or_else(|| LoadError::NotBuilt(source))
    }

    /// Forward a change callback to the coordinator and keep the merged
    /// diagnostic state current.
    pub async fn on_change(&mut self, path: &Path) -> ChangeOutcome {
        let outcome = self.reloader.on_change(path).await;

        if let ChangeOutcome::Recompiled { diagnostics, .. } = &outcome {
            self.last_compile = diagnostics.clone();
            // The old report no longer describes the program; drop it until
            // the worker reports back.
            self.last_check.clear();

            if let Some(worker) = &self.typecheck {
                let source = if path.extension().is_some_and(|e| e == "js") {
                    with_ext(path, "ts")
                } else {
                    path.to_path_buf()
                };
                worker.request(CheckRequest {
                    changed: vec![source],
                });
            }
        }
        outcome
    }

    /// Drain finished type-check reports, folding them into the served
    /// diagnostic state and force-refreshing every erroring file.
    pub fn poll_type_check(&mut self) {
        let Some(worker) = &self.typecheck else {
            return;
        };
        let mut results = Vec::new();
        while let Some(result) = worker.try_result() {
            results.push(result);
        }
        for result in results {
            self.handle_check_result(result.diagnostics);
        }
    }

    fn handle_check_result(&mut self, diagnostics: Vec<Diagnostic>) {
        let erroring = files_with_errors(&diagnostics);
        if !erroring.is_empty() {
            log!(
                "check"; "type check found errors in {} file(s)",
                erroring.len()
            );
        }
        self.last_check = diagnostics;

        // Clients re-request the erroring file, hit the load path and
        // observe the stored diagnostics.
        for file in erroring {
            self.reloader.signal(&file);
        }
    }

    /// Deliver preprocessed style content to any parked compile pass.
    pub fn submit_style(&self, path: &Path, css: &str) {
        if let Some(store) = &self.store {
            store.submit_style(path, css);
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut merged = self.last_compile.clone();
        merged.extend(self.last_check.iter().cloned());
        merged
    }
}
