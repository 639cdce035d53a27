//! Path normalization and output-name mapping.
//!
//! Every cache in this crate is keyed by a normalized absolute path so that
//! two raw spellings of the same file hit the same entry.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// Extensions treated as style resources (preprocessed before compilation).
pub const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less", "styl"];

/// Extensions treated as component templates.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["html"];

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Swap the extension of a path (`app.ts` + `"js"` -> `app.js`).
#[inline]
pub fn with_ext(path: &Path, ext: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    out.set_extension(ext);
    out
}

/// Map a compiled output path (relative to the source root) back to its
/// source counterpart: re-root and substitute `.js` -> `.ts`.
pub fn source_for_output(source_root: &Path, output: &Path) -> PathBuf {
    with_ext(&source_root.join(output), "ts")
}

/// Compiled-output name for a style resource (`button.scss` -> `button.css`).
pub fn compiled_style_name(path: &Path) -> PathBuf {
    with_ext(&normalize_path(path), "css")
}

fn has_extension(path: &Path, set: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| set.contains(&e))
}

/// True for style files (css and preprocessable languages).
#[inline]
pub fn is_style(path: &Path) -> bool {
    has_extension(path, STYLE_EXTENSIONS)
}

/// True for template/style resources referenced by component sources.
#[inline]
pub fn is_resource(path: &Path) -> bool {
    is_style(path) || has_extension(path, TEMPLATE_EXTENSIONS)
}

/// True for compilable script sources.
#[inline]
pub fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "ts")
}

static SOURCE_MAP_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//# sourceMappingURL.*").unwrap());

/// Strip an embedded `//# sourceMappingURL=` comment from emitted text.
///
/// Applied when source maps are managed externally, so the served file does
/// not carry a duplicate directive.
pub fn strip_source_map_comment(text: &str) -> String {
    SOURCE_MAP_COMMENT.replace(text, "").into_owned()
}
