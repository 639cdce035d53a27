//! Shared fixtures for unit tests: an in-memory host with call counters, a
//! compiler that fails on cue, and a change-signal recorder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::compiler::{
    Compiler, CompilerFailure, CompilerHost, CompilerOptions, LangVersion, Program, SourceFile,
};
use crate::reload::DevServer;
use crate::utils::normalize_path;

/// In-memory compiler host. Counts delegate reads per path so tests can
/// assert that a caching layer consulted it at most once.
#[derive(Default)]
pub struct MemoryHost {
    files: DashMap<PathBuf, String>,
    reads: Mutex<FxHashMap<PathBuf, usize>>,
    written: Mutex<Vec<(PathBuf, String)>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, text: &str) {
        self.files
            .insert(normalize_path(Path::new(path)), text.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files.remove(&normalize_path(Path::new(path)));
    }

    pub fn read_count(&self, path: &str) -> usize {
        self.reads
            .lock()
            .get(&normalize_path(Path::new(path)))
            .copied()
            .unwrap_or(0)
    }

    /// Writes forwarded all the way to this delegate. A caching layer above
    /// it should intercept them, leaving this empty.
    pub fn written(&self) -> Vec<(PathBuf, String)> {
        self.written.lock().clone()
    }

    fn record_read(&self, path: &Path) {
        *self.reads.lock().entry(path.to_path_buf()).or_insert(0) += 1;
    }
}

impl CompilerHost for MemoryHost {
    fn file_exists(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        self.record_read(&path);
        self.files.contains_key(&path)
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        let path = normalize_path(path);
        self.record_read(&path);
        self.files.get(&path).map(|t| t.clone())
    }

    fn get_source_file(&self, path: &Path, lang: LangVersion) -> Option<Arc<SourceFile>> {
        let path = normalize_path(path);
        self.record_read(&path);
        let text = self.files.get(&path).map(|t| t.clone())?;
        Some(Arc::new(SourceFile { path, text, lang }))
    }

    fn write_file(&self, path: &Path, text: &str) {
        self.written
            .lock()
            .push((normalize_path(path), text.to_string()));
    }

    async fn read_resource(&self, path: &Path) -> anyhow::Result<String> {
        let path = normalize_path(path);
        self.record_read(&path);
        self.files
            .get(&path)
            .map(|t| t.clone())
            .ok_or_else(|| anyhow::anyhow!("no such resource: {}", path.display()))
    }
}

/// Compiler whose next program fails on cue, for error-path tests. Wraps
/// the passthrough compiler and injects the scripted failure into
/// `load_structure`.
pub struct FailingCompiler {
    failure: Mutex<Option<CompilerFailure>>,
}

impl FailingCompiler {
    pub fn new() -> Self {
        Self {
            failure: Mutex::new(None),
        }
    }

    pub fn fail_next(&self, failure: CompilerFailure) {
        *self.failure.lock() = Some(failure);
    }
}

pub struct FailingProgram<H: CompilerHost> {
    inner: crate::compiler::PassthroughProgram<H>,
    failure: Option<CompilerFailure>,
}

impl<H: CompilerHost> Program for FailingProgram<H> {
    async fn load_structure(&mut self) -> Result<(), CompilerFailure> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        self.inner.load_structure().await
    }

    fn gather_diagnostics(&self) -> Vec<crate::diagnostics::Diagnostic> {
        self.inner.gather_diagnostics()
    }

    fn emit(&mut self) -> Result<crate::compiler::EmitResult, CompilerFailure> {
        self.inner.emit()
    }
}

impl<H: CompilerHost> Compiler<H> for FailingCompiler {
    type Program = FailingProgram<H>;

    fn create_program(
        &self,
        root_names: &[PathBuf],
        options: &CompilerOptions,
        host: Arc<H>,
        old_program: Option<Self::Program>,
    ) -> Result<Self::Program, CompilerFailure> {
        let inner = crate::compiler::PassthroughCompiler.create_program(
            root_names,
            options,
            host,
            old_program.map(|p| p.inner),
        )?;
        Ok(FailingProgram {
            inner,
            failure: self.failure.lock().take(),
        })
    }
}

/// Records every change signal instead of broadcasting it.
#[derive(Default)]
pub struct RecordingServer {
    signals: Mutex<Vec<PathBuf>>,
}

impl RecordingServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<PathBuf> {
        self.signals.lock().clone()
    }
}

impl DevServer for RecordingServer {
    fn mark_changed(&self, path: &Path) {
        self.signals.lock().push(path.to_path_buf());
    }
}
