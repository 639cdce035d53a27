//! `reflow build` - one full compile, outputs flushed to disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::compiler::{FsHost, PassthroughCompiler};
use crate::config::Config;
use crate::diagnostics::{format_diagnostics, has_errors};
use crate::engine::Engine;
use crate::host::CachingHost;
use crate::log;

pub fn build_project(config: &Config, out_dir: Option<&Path>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, out_dir))
}

async fn run(config: &Config, out_dir: Option<&Path>) -> Result<()> {
    let options = config.compiler_options();
    let host = Arc::new(CachingHost::new(FsHost, &options, None));
    let mut engine = Engine::new(
        PassthroughCompiler,
        config.root_names(),
        options,
        host.clone(),
    );

    let start = std::time::Instant::now();
    let outcome = engine.compile().await;

    if !outcome.diagnostics.is_empty() {
        print!("{}", format_diagnostics(&outcome.diagnostics));
    }
    if has_errors(&outcome.diagnostics) {
        bail!(
            "build failed with {} diagnostic(s)",
            outcome.diagnostics.len()
        );
    }

    let out_dir = out_dir.map_or_else(|| config.out_dir(), Path::to_path_buf);
    let source_root = config.source_root();
    let built = host.built_files();
    for (path, text) in &built {
        let target = match path.strip_prefix(&source_root) {
            Ok(rel) => out_dir.join(rel),
            Err(_) => continue,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, text)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }

    log!(
        "build"; "wrote {} file(s) to {} in {:.2?}",
        built.len(),
        out_dir.display(),
        start.elapsed()
    );
    Ok(())
}
