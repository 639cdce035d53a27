//! Compiler diagnostics and per-file partitioning.
//!
//! Diagnostics are produced by the external compiler and only partitioned
//! and rendered here. The origin is a tagged variant so that the
//! owning-file lookup is total: a diagnostic raised inside a component
//! template attributes to the component source file, not to the template.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::utils::normalize_path;

/// Error code for failures with a recognized syntax marker.
pub const DEFAULT_ERROR_CODE: u32 = 100;
/// Error code for failures that left the compiler in an unknown state.
pub const UNKNOWN_ERROR_CODE: u32 = 500;

/// Diagnostic severity, ordered by weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Message,
    Warning,
    Error,
}

impl Severity {
    const fn label(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Where a diagnostic originated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticSource {
    /// Bound to a source file.
    File(PathBuf),
    /// Raised inside a template; attributes to the owning component file.
    Template {
        template: PathBuf,
        component: PathBuf,
    },
    /// Not tied to any input file.
    Global,
}

/// A single compiler or type-checker finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: u32,
    pub message: String,
    /// Extra failure detail (backtraces, compiler internals). Absent for
    /// recognized syntax errors.
    pub detail: Option<String>,
    pub origin: DiagnosticSource,
}

impl Diagnostic {
    pub fn error(code: u32, message: impl Into<String>, origin: DiagnosticSource) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            detail: None,
            origin,
        }
    }

    pub fn warning(code: u32, message: impl Into<String>, origin: DiagnosticSource) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            detail: None,
            origin,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The input file this diagnostic attributes to, if any.
    ///
    /// Template diagnostics resolve to their owning component file.
    pub fn owning_file(&self) -> Option<&Path> {
        match &self.origin {
            DiagnosticSource::File(file) => Some(file),
            DiagnosticSource::Template { component, .. } => Some(component),
            DiagnosticSource::Global => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// True if any diagnostic in the set is of error severity.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Error diagnostics whose owning file equals the normalized target path.
pub fn errors_in_file(path: &Path, diagnostics: &[Diagnostic]) -> Vec<Diagnostic> {
    let target = normalize_path(path);
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .filter(|d| {
            d.owning_file()
                .is_some_and(|f| normalize_path(f) == target)
        })
        .cloned()
        .collect()
}

/// All files that carry at least one error diagnostic.
///
/// Used to decide which files must be force-refreshed when the out-of-band
/// type-check pass reports new errors.
pub fn files_with_errors(diagnostics: &[Diagnostic]) -> FxHashSet<PathBuf> {
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .filter_map(|d| d.owning_file())
        .map(normalize_path)
        .collect()
}

/// Render a diagnostic set for terminal/log output.
///
/// Fixed policy: canonical file names, paths shown relative to the current
/// working directory, `\n` line endings. Rendering only, never control flow.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let cwd = std::env::current_dir().unwrap_or_default();
    let mut out = String::new();
    for diag in diagnostics {
        let location = diag.owning_file().map(|file| {
            let file = normalize_path(file);
            file.strip_prefix(&cwd)
                .map_or_else(|_| file.display().to_string(), |p| p.display().to_string())
        });
        match location {
            Some(location) => out.push_str(&format!(
                "{}: {} RF{}: {}\n",
                location,
                diag.severity.label(),
                diag.code,
                diag.message
            )),
            None => out.push_str(&format!(
                "{} RF{}: {}\n",
                diag.severity.label(),
                diag.code,
                diag.message
            )),
        }
        if let Some(detail) = &diag.detail {
            out.push_str(detail);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_error(path: &str) -> Diagnostic {
        Diagnostic::error(1, "boom", DiagnosticSource::File(PathBuf::from(path)))
    }

    #[test]
    fn test_owning_file_is_total() {
        let d = Diagnostic::error(
            1,
            "bad binding",
            DiagnosticSource::Template {
                template: PathBuf::from("/proj/src/app.html"),
                component: PathBuf::from("/proj/src/app.ts"),
            },
        );
        assert_eq!(d.owning_file(), Some(Path::new("/proj/src/app.ts")));

        let g = Diagnostic::error(1, "global", DiagnosticSource::Global);
        assert_eq!(g.owning_file(), None);
    }

    #[test]
    fn test_errors_in_file_filters_by_owner() {
        let diags = vec![
            file_error("/proj/src/app.ts"),
            file_error("/proj/src/main.ts"),
            Diagnostic::warning(
                2,
                "unused",
                DiagnosticSource::File(PathBuf::from("/proj/src/app.ts")),
            ),
            Diagnostic::error(
                3,
                "template",
                DiagnosticSource::Template {
                    template: PathBuf::from("/proj/src/app.html"),
                    component: PathBuf::from("/proj/src/app.ts"),
                },
            ),
        ];

        let in_app = errors_in_file(Path::new("/proj/src/app.ts"), &diags);
        assert_eq!(in_app.len(), 2);
        assert!(in_app.iter().all(Diagnostic::is_error));

        let in_main = errors_in_file(Path::new("/proj/src/main.ts"), &diags);
        assert_eq!(in_main.len(), 1);
    }

    #[test]
    fn test_files_with_errors() {
        let diags = vec![
            file_error("/proj/src/app.ts"),
            file_error("/proj/src/app.ts"),
            Diagnostic::error(1, "global", DiagnosticSource::Global),
            Diagnostic::warning(
                2,
                "unused",
                DiagnosticSource::File(PathBuf::from("/proj/src/main.ts")),
            ),
        ];

        let files = files_with_errors(&diags);
        assert_eq!(files.len(), 1);
        assert!(files.contains(Path::new("/proj/src/app.ts")));
    }

    #[test]
    fn test_format_includes_code_and_detail() {
        let diags = vec![
            Diagnostic::error(500, "compiler crashed", DiagnosticSource::Global)
                .with_detail("stack: frame 0"),
        ];
        let text = format_diagnostics(&diags);
        assert!(text.contains("error RF500: compiler crashed"));
        assert!(text.contains("stack: frame 0"));
        assert!(text.ends_with('\n'));
    }
}
