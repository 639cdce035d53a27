//! `reflow serve` - watch mode with incremental recompiles, style
//! preprocessing and reload signalling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::compiler::{FsHost, PassthroughCompiler};
use crate::config::Config;
use crate::diagnostics::{format_diagnostics, has_errors};
use crate::engine::Engine;
use crate::freshness::FreshnessCache;
use crate::host::CachingHost;
use crate::logger;
use crate::reload::{ChangeOutcome, Reloader, WsServer};
use crate::resource::ResourceStore;
use crate::service::CompilerService;
use crate::style::{CssProcessor, StyleProcessor};
use crate::typecheck::TypeCheckWorker;
use crate::utils::{is_resource, is_source};
use crate::{debug, log};

type ServeService = CompilerService<PassthroughCompiler, FsHost, WsServer>;

pub fn serve_project(config: &Config, port: Option<u16>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, port))
}

async fn run(config: &Config, port: Option<u16>) -> Result<()> {
    let options = config.compiler_options();
    let store = Arc::new(ResourceStore::new());
    let style_requests = store.subscribe();

    let server = Arc::new(WsServer::start(port.unwrap_or(config.serve.ws_port))?);
    log!("serve"; "reload server on ws://127.0.0.1:{}", server.port());

    let host = Arc::new(CachingHost::new(FsHost, &options, Some(store.clone())));
    let engine = Engine::new(
        PassthroughCompiler,
        config.root_names(),
        options.clone(),
        host,
    );
    let reloader = Reloader::new(
        engine,
        server,
        Some(store.clone()),
        Some(FreshnessCache::new()),
        config.fallback(),
    );

    // The worker compiles against its own host so its passes never block
    // or pollute the serving caches.
    let check_host = Arc::new(CachingHost::new(FsHost, &options, None));
    let worker = TypeCheckWorker::spawn(
        PassthroughCompiler,
        config.root_names(),
        options,
        check_host,
    )?;

    let mut service = CompilerService::new(reloader, Some(store.clone()), Some(worker));

    spawn_style_task(style_requests, store, config.serve.minify_css);

    let start = std::time::Instant::now();
    let diagnostics = service.ensure_built().await.to_vec();
    if has_errors(&diagnostics) {
        print!("{}", format_diagnostics(&diagnostics));
        log!("serve"; "initial build finished with errors; watching for fixes");
    } else {
        log!("serve"; "initial build done in {:.2?}", start.elapsed());
    }

    // The watcher handle must stay alive for the whole session.
    let source_root = config.source_root();
    let (_watcher, mut fs_events) = watch_sources(&source_root)?;
    log!("watch"; "watching {}", source_root.display());

    let mut shutdown = register_shutdown()?;
    let debounce = Duration::from_millis(config.serve.debounce_ms);
    let mut check_ticker = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            changed = fs_events.recv() => {
                let Some(first) = changed else { break };
                // Collect the burst the editor fired along with it.
                tokio::time::sleep(debounce).await;
                let mut batch = vec![first];
                while let Ok(path) = fs_events.try_recv() {
                    batch.push(path);
                }
                batch.sort();
                batch.dedup();
                for path in batch {
                    handle_change(&mut service, &path).await;
                }
            }
            _ = check_ticker.tick() => {
                if crate::core::is_shutdown() {
                    break;
                }
                service.poll_type_check();
            }
        }
    }

    log!("serve"; "shutting down");
    Ok(())
}

async fn handle_change(service: &mut ServeService, path: &Path) {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    match service.on_change(path).await {
        ChangeOutcome::Suppressed => {}
        ChangeOutcome::Unchanged => {
            logger::status_unchanged(&format!("{name} unchanged"));
        }
        ChangeOutcome::Recompiled {
            diagnostics,
            signaled,
        } => {
            if has_errors(&diagnostics) {
                logger::status_error(
                    &format!("failed: {name}"),
                    format_diagnostics(&diagnostics).trim_end(),
                );
            } else {
                logger::status_success(&format!(
                    "{name} recompiled, signaled {} file(s)",
                    signaled.len()
                ));
            }
        }
    }
}

/// Answer style-request announcements: read the raw source, run it through
/// the processor and deliver the result to parked compile passes.
fn spawn_style_task(
    mut requests: mpsc::UnboundedReceiver<PathBuf>,
    store: Arc<ResourceStore>,
    minify: bool,
) {
    tokio::spawn(async move {
        let processor = CssProcessor::new(minify);
        while let Some(path) = requests.recv().await {
            debug!("style"; "processing {}", path.display());
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    log!("style"; "failed to read {}: {}", path.display(), e);
                    // Deliver something so the parked pass can finish; the
                    // compile diagnostics will surface the real problem.
                    store.submit_style(&path, "");
                    continue;
                }
            };
            let css = match processor.process(&path, &raw) {
                Ok(built) => built.css,
                Err(e) => {
                    log!("style"; "{}", e);
                    raw
                }
            };
            store.submit_style(&path, &css);
        }
    });
}

/// Register the Ctrl+C channel and bridge it onto a tokio channel the
/// select loop can await.
fn register_shutdown() -> Result<mpsc::UnboundedReceiver<()>> {
    let (ctrlc_tx, ctrlc_rx) = crossbeam::channel::bounded::<()>(1);
    crate::core::register_shutdown_channel(ctrlc_tx);

    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        if ctrlc_rx.recv().is_ok() {
            let _ = tx.send(());
        }
    });
    Ok(rx)
}

/// Start a notify watcher on the source root, bridged onto a tokio channel
/// and filtered down to compilable sources and resources.
fn watch_sources(
    source_root: &Path,
) -> Result<(notify::RecommendedWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })?;
    watcher.watch(source_root, RecursiveMode::Recursive)?;

    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    log!("watch"; "watcher error: {}", e);
                    continue;
                }
            };
            if !is_content_event(&event.kind) {
                continue;
            }
            for path in event.paths {
                if is_relevant(&path) && tx.send(path).is_err() {
                    return;
                }
            }
        }
    });

    Ok((watcher, rx))
}

/// Metadata-only modifications (mtime, chmod) recompile nothing and would
/// churn the freshness cache.
fn is_content_event(kind: &notify::EventKind) -> bool {
    use notify::EventKind;
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(modify) => !matches!(modify, notify::event::ModifyKind::Metadata(_)),
        _ => false,
    }
}

fn is_relevant(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden && (is_source(path) || is_resource(path))
}
