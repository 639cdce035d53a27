//! Style preprocessing for the dev server.
//!
//! The serve loop answers style-request announcements by running the
//! requested file through a [`StyleProcessor`] and submitting the result to
//! the resource store. The default processor normalizes plain CSS through
//! lightningcss; anything it cannot handle is passed through verbatim so a
//! missing preprocessor never wedges a parked compile pass.

use std::path::Path;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

use crate::debug;

/// A processed stylesheet ready for submission to the resource store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltStyle {
    pub css: String,
}

pub trait StyleProcessor: Send + Sync + 'static {
    /// Whether this processor wants to transform the given path at all.
    fn needs_processing(&self, path: &Path) -> bool;

    /// Transform raw style source into CSS.
    fn process(&self, path: &Path, source: &str) -> anyhow::Result<BuiltStyle>;
}

/// CSS normalizer backed by lightningcss. Re-prints plain `.css` input,
/// which catches syntax errors early and strips redundant whitespace.
pub struct CssProcessor {
    minify: bool,
}

impl CssProcessor {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }
}

impl StyleProcessor for CssProcessor {
    fn needs_processing(&self, path: &Path) -> bool {
        path.extension().is_some_and(|e| e == "css")
    }

    fn process(&self, path: &Path, source: &str) -> anyhow::Result<BuiltStyle> {
        if !self.needs_processing(path) {
            debug!("style"; "passing through {} unprocessed", path.display());
            return Ok(BuiltStyle {
                css: source.to_string(),
            });
        }

        let stylesheet = StyleSheet::parse(source, ParserOptions::default())
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: self.minify,
                ..PrinterOptions::default()
            })
            .map_err(|e| anyhow::anyhow!("failed to print {}: {}", path.display(), e))?;

        Ok(BuiltStyle { css: result.code })
    }
}
