//! Background type-check worker.
//!
//! Full semantic checking is too slow for the edit loop, so the serve path
//! emits on structural diagnostics only and runs the complete check on a
//! dedicated thread. The worker owns an independent engine over its own
//! host, so its passes never contend with the serving engine's caches.
//!
//! Communication is message passing over crossbeam channels: the serve
//! loop posts changed-path batches and polls for finished reports.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};

use crate::compiler::{Compiler, CompilerHost, CompilerOptions};
use crate::diagnostics::Diagnostic;
use crate::engine::Engine;
use crate::host::CachingHost;
use crate::{debug, log};

/// A batch of changed paths to re-check. An empty batch requests a full
/// check from the current state.
#[derive(Debug, Default)]
pub struct CheckRequest {
    pub changed: Vec<PathBuf>,
}

/// Finished check report.
#[derive(Debug)]
pub struct CheckResult {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct TypeCheckWorker {
    requests: Sender<CheckRequest>,
    results: Receiver<CheckResult>,
}

impl TypeCheckWorker {
    /// Spawn the worker thread. `host` must be a host independent from the
    /// serving engine's; the worker compiles against it exclusively.
    pub fn spawn<C, H>(
        compiler: C,
        root_names: Vec<PathBuf>,
        options: CompilerOptions,
        host: Arc<CachingHost<H>>,
    ) -> anyhow::Result<Self>
    where
        C: Compiler<CachingHost<H>>,
        H: CompilerHost,
    {
        let (request_tx, request_rx) = unbounded::<CheckRequest>();
        let (result_tx, result_rx) = unbounded::<CheckResult>();

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;

        std::thread::Builder::new()
            .name("typecheck".into())
            .spawn(move || {
                let mut engine = Engine::new(compiler, root_names, options, host);
                run_worker(&mut engine, &runtime, &request_rx, &result_tx);
                debug!("typecheck"; "worker exiting");
            })?;

        Ok(Self {
            requests: request_tx,
            results: result_rx,
        })
    }

    /// Queue a check. Requests posted while a pass is running are coalesced
    /// into the next one.
    pub fn request(&self, request: CheckRequest) {
        if self.requests.send(request).is_err() {
            log!("typecheck"; "worker is gone, request dropped");
        }
    }

    /// Non-blocking poll for a finished report.
    pub fn try_result(&self) -> Option<CheckResult> {
        self.results.try_recv().ok()
    }
}

fn run_worker<C, H>(
    engine: &mut Engine<C, H>,
    runtime: &tokio::runtime::Runtime,
    requests: &Receiver<CheckRequest>,
    results: &Sender<CheckResult>,
) where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
{
    while let Ok(request) = requests.recv() {
        if crate::core::is_shutdown() {
            break;
        }

        let mut changed = request.changed;
        // Coalesce every queued batch into a single pass.
        loop {
            match requests.try_recv() {
                Ok(next) => changed.extend(next.changed),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        changed.sort();
        changed.dedup();

        let outcome = runtime.block_on(engine.recompile(&changed));
        debug!(
            "typecheck"; "pass finished, {} diagnostics",
            outcome.diagnostics.len()
        );

        if results
            .send(CheckResult {
                diagnostics: outcome.diagnostics,
            })
            .is_err()
        {
            return;
        }
    }
}
