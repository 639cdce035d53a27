//! Project configuration from `reflow.toml`.
//!
//! # Example
//!
//! ```toml
//! [project]
//! source_root = "src"
//! roots = ["main.ts"]
//! fallback = "index.html"
//!
//! [build]
//! out_dir = "dist"
//! source_map = "external"
//! lang = "esnext"
//!
//! [serve]
//! ws_port = 5277
//! debounce_ms = 60
//! minify_css = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::compiler::{CompilerOptions, LangVersion, SourceMapMode};
use crate::utils::normalize_path;

pub const CONFIG_FILE: &str = "reflow.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root directory, parent of the config file.
    #[serde(skip)]
    pub root: PathBuf,

    pub project: ProjectConfig,
    pub build: BuildConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Source directory, relative to the project root.
    pub source_root: PathBuf,
    /// Root inputs, relative to the source root.
    pub roots: Vec<PathBuf>,
    /// File signaled when a pass rewrites nothing, relative to the source
    /// root.
    pub fallback: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src"),
            roots: vec![PathBuf::from("main.ts")],
            fallback: PathBuf::from("index.html"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Output directory for full builds, relative to the project root.
    pub out_dir: PathBuf,
    pub source_map: SourceMapMode,
    pub lang: LangVersion,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist"),
            source_map: SourceMapMode::default(),
            lang: LangVersion::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    /// Base port for the reload WebSocket server.
    pub ws_port: u16,
    /// Watcher debounce window.
    pub debounce_ms: u64,
    /// Minify preprocessed CSS before submitting it.
    pub minify_css: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            ws_port: 5277,
            debounce_ms: 60,
            minify_css: false,
        }
    }
}

impl Config {
    /// Load the config, searching upward from the current directory.
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let path = find_config_file(&cwd)
            .with_context(|| format!("no {CONFIG_FILE} found from {}", cwd.display()))?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.root = normalize_path(path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Absolute source root.
    pub fn source_root(&self) -> PathBuf {
        normalize_path(&self.root.join(&self.project.source_root))
    }

    /// Absolute root inputs.
    pub fn root_names(&self) -> Vec<PathBuf> {
        let source_root = self.source_root();
        self.project
            .roots
            .iter()
            .map(|r| normalize_path(&source_root.join(r)))
            .collect()
    }

    /// Absolute fallback signal file.
    pub fn fallback(&self) -> PathBuf {
        normalize_path(&self.source_root().join(&self.project.fallback))
    }

    /// Absolute output directory for full builds.
    pub fn out_dir(&self) -> PathBuf {
        normalize_path(&self.root.join(&self.build.out_dir))
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            source_root: self.source_root(),
            lang: self.build.lang,
            source_map: self.build.source_map,
        }
    }
}

/// Search upward from `start` for the config file.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.project.source_root, PathBuf::from("src"));
        assert_eq!(config.project.roots, vec![PathBuf::from("main.ts")]);
        assert_eq!(config.build.source_map, SourceMapMode::External);
        assert_eq!(config.serve.ws_port, 5277);
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::from_str(
            r#"
[project]
source_root = "app"
roots = ["boot.ts", "admin.ts"]
fallback = "shell.html"

[build]
source_map = "inline"
lang = "es2020"

[serve]
ws_port = 9000
"#,
        )
        .unwrap();

        assert_eq!(config.project.roots.len(), 2);
        assert_eq!(config.project.fallback, PathBuf::from("shell.html"));
        assert_eq!(config.build.source_map, SourceMapMode::Inline);
        assert_eq!(config.build.lang, LangVersion::Es2020);
        assert_eq!(config.serve.ws_port, 9000);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(Config::from_str("[project]\ntypo_field = 1\n").is_err());
    }

    #[test]
    fn test_paths_resolve_against_root() {
        use std::fs;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[project]\nsource_root = \"web\"\n").unwrap();

        let config = Config::from_path(&path).unwrap();
        assert!(config.source_root().ends_with("web"));
        assert!(config.source_root().is_absolute());
        assert!(config.root_names()[0].ends_with("web/main.ts"));
    }
}
