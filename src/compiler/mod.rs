//! Boundary contracts for the external component-framework compiler.
//!
//! The actual type-checking/codegen compiler is an external collaborator.
//! This crate only depends on the capability sets below:
//!
//! - [`CompilerHost`] - filesystem-facing operations the compiler performs,
//!   intercepted by the caching decorator in [`crate::host`]
//! - [`Compiler`] / [`Program`] - program construction (optionally seeded
//!   with the prior program for incremental analysis), asynchronous
//!   structural loading, diagnostics gathering and emission
//!
//! [`PassthroughCompiler`] is the shipped reference implementation used by
//! the binary and the test suite.

mod failure;
mod fs;
mod passthrough;

pub use failure::CompilerFailure;
pub use fs::FsHost;
pub use passthrough::{PassthroughCompiler, PassthroughProgram};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::diagnostics::Diagnostic;

/// Script language level the compiler should assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LangVersion {
    Es2020,
    #[default]
    EsNext,
}

/// How emitted source maps are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// No source maps.
    None,
    /// Separate `.js.map` files; embedded sourceMappingURL comments are
    /// stripped from the served text to avoid duplicate directives.
    #[default]
    External,
    /// Source map inlined into the emitted text; nothing is stripped.
    Inline,
}

/// Options handed to the compiler on every program construction.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Compilation root; output paths are tracked relative to it.
    pub source_root: PathBuf,
    pub lang: LangVersion,
    pub source_map: SourceMapMode,
}

/// A parsed source file handle.
///
/// Owned by the current compiler program; the caching layer discards its
/// handle whenever the path's cache entry is dropped.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub lang: LangVersion,
}

/// Result of one emission pass. Written files arrive as `write_file` side
/// effects on the host; only diagnostics travel back directly.
#[derive(Debug, Default)]
pub struct EmitResult {
    pub diagnostics: Vec<Diagnostic>,
}

/// Filesystem-facing capability set the compiler consumes.
///
/// `read_resource` takes precedence over `read_file` for template/style
/// paths and may suspend until preprocessed content becomes available.
pub trait CompilerHost: Send + Sync + 'static {
    fn file_exists(&self, path: &Path) -> bool;

    fn read_file(&self, path: &Path) -> Option<String>;

    fn get_source_file(&self, path: &Path, lang: LangVersion) -> Option<Arc<SourceFile>>;

    fn write_file(&self, path: &Path, text: &str);

    fn read_resource(&self, path: &Path)
    -> impl Future<Output = anyhow::Result<String>> + Send;

    /// Resource files currently known to be stale; the compiler re-reads
    /// these instead of reusing them from the prior program.
    fn modified_resource_files(&self) -> FxHashSet<PathBuf> {
        FxHashSet::default()
    }
}

/// One compilation pass over the program graph.
pub trait Program: Send + 'static {
    /// Resolve the structural graph (imports, templates, styles). Suspends
    /// for asynchronous resource resolution; must complete before
    /// diagnostics are gathered.
    fn load_structure(&mut self) -> impl Future<Output = Result<(), CompilerFailure>> + Send;

    fn gather_diagnostics(&self) -> Vec<Diagnostic>;

    /// Emit compiled output through the host's `write_file`.
    fn emit(&mut self) -> Result<EmitResult, CompilerFailure>;
}

/// Program construction, optionally seeded with the prior program so the
/// compiler can reuse unchanged analysis.
pub trait Compiler<H: CompilerHost>: Send + Sync + 'static {
    type Program: Program;

    fn create_program(
        &self,
        root_names: &[PathBuf],
        options: &CompilerOptions,
        host: Arc<H>,
        old_program: Option<Self::Program>,
    ) -> Result<Self::Program, CompilerFailure>;
}
