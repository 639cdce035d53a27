//! Compilation engine: full and incremental passes over one program.
//!
//! The engine owns the current program instance and the caching host. A
//! pass runs create, structural load, diagnostics, emit; emission is
//! skipped whenever error diagnostics are present so stale-but-consistent
//! outputs keep being served. Incremental passes hand the prior program to
//! the compiler as a seed and report exactly the outputs rewritten through
//! the host's write interception.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compiler::{Compiler, CompilerHost, CompilerOptions, Program};
use crate::debug;
use crate::diagnostics::{Diagnostic, has_errors};
use crate::host::CachingHost;
use crate::utils::is_resource;

/// Outcome of a single compile pass.
pub struct Compilation<P> {
    /// The program, kept for seeding the next pass. `None` after a
    /// compiler failure; the next pass then starts from scratch.
    pub program: Option<P>,
    pub diagnostics: Vec<Diagnostic>,
    pub emitted: bool,
}

/// Run one pass: create the program (seeded with `old_program` when
/// available), load structure, gather diagnostics, emit if clean. Any
/// [`CompilerFailure`](crate::compiler::CompilerFailure) is converted to a
/// diagnostic and voids the program.
pub async fn perform_compilation<C, H>(
    compiler: &C,
    root_names: &[PathBuf],
    options: &CompilerOptions,
    host: Arc<CachingHost<H>>,
    old_program: Option<C::Program>,
) -> Compilation<C::Program>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
{
    let mut program = match compiler.create_program(root_names, options, host, old_program) {
        Ok(program) => program,
        Err(failure) => {
            return Compilation {
                program: None,
                diagnostics: vec![failure.into_diagnostic()],
                emitted: false,
            };
        }
    };

    if let Err(failure) = program.load_structure().await {
        return Compilation {
            program: None,
            diagnostics: vec![failure.into_diagnostic()],
            emitted: false,
        };
    }

    let mut diagnostics = program.gather_diagnostics();
    if has_errors(&diagnostics) {
        debug!("engine"; "emission skipped, {} diagnostics", diagnostics.len());
        return Compilation {
            program: Some(program),
            diagnostics,
            emitted: false,
        };
    }

    match program.emit() {
        Ok(result) => {
            diagnostics.extend(result.diagnostics);
            Compilation {
                program: Some(program),
                diagnostics,
                emitted: true,
            }
        }
        Err(failure) => {
            diagnostics.push(failure.into_diagnostic());
            Compilation {
                program: None,
                diagnostics,
                emitted: false,
            }
        }
    }
}

/// Outcome of an incremental pass.
pub struct Recompilation {
    pub diagnostics: Vec<Diagnostic>,
    /// Outputs rewritten during the pass, relative to the source root.
    pub recompiled: Vec<PathBuf>,
    pub emitted: bool,
}

pub struct Engine<C, H>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
{
    compiler: C,
    root_names: Vec<PathBuf>,
    options: CompilerOptions,
    host: Arc<CachingHost<H>>,
    program: Option<C::Program>,
}

impl<C, H> Engine<C, H>
where
    C: Compiler<CachingHost<H>>,
    H: CompilerHost,
{
    pub fn new(
        compiler: C,
        root_names: Vec<PathBuf>,
        options: CompilerOptions,
        host: Arc<CachingHost<H>>,
    ) -> Self {
        Self {
            compiler,
            root_names,
            options,
            host,
            program: None,
        }
    }

    pub fn host(&self) -> &Arc<CachingHost<H>> {
        &self.host
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn root_names(&self) -> &[PathBuf] {
        &self.root_names
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    /// Full pass. Seeds from the current program when one survives.
    pub async fn compile(&mut self) -> Recompilation {
        self.host.begin_pass();
        let outcome = perform_compilation(
            &self.compiler,
            &self.root_names,
            &self.options,
            self.host.clone(),
            self.program.take(),
        )
        .await;
        self.program = outcome.program;

        Recompilation {
            diagnostics: outcome.diagnostics,
            recompiled: self.host.recompiled_outputs(),
            emitted: outcome.emitted,
        }
    }

    /// Incremental pass for a set of changed paths. Cache entries for the
    /// changed files are dropped first; changed resources are additionally
    /// flagged so the compiler re-reads them instead of reusing the prior
    /// program's copy.
    pub async fn recompile(&mut self, changed: &[PathBuf]) -> Recompilation {
        for path in changed {
            self.host.invalidate(path);
            if is_resource(path) {
                self.host.mark_resource_modified(path.clone());
            }
        }

        let outcome = self.compile().await;
        self.host.drain_modified_resources();
        outcome
    }

    /// Drop cached state for a path without running a pass.
    pub fn invalidate(&self, path: &Path) {
        self.host.invalidate(path);
    }
}

#[cfg(test)]
mod tests;
