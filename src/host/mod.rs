//! Caching decorator over a compiler host.
//!
//! Wraps a delegate [`CompilerHost`] and memoizes every filesystem-facing
//! operation for the duration of a compile pass. The wrapper is composed at
//! construction time and holds the delegate as a field; nothing mutates a
//! shared host object in place.
//!
//! Intercepted writes never reach the delegate: emitted text lands in the
//! in-memory built-file map (the serving source of truth in dev mode) and
//! each written path is recorded in the per-pass recompiled set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::compiler::{CompilerHost, CompilerOptions, LangVersion, SourceFile, SourceMapMode};
use crate::resource::ResourceStore;
use crate::utils::{is_style, normalize_path, strip_source_map_comment};

/// Memoized state for one normalized path. Each field is populated at most
/// once per cache lifetime; the whole entry is dropped on invalidation.
#[derive(Default)]
struct CacheEntry {
    exists: Option<bool>,
    source: Option<Arc<SourceFile>>,
    content: Option<String>,
}

/// Caching decorator over a delegate compiler host.
pub struct CachingHost<H: CompilerHost> {
    delegate: H,
    source_root: PathBuf,
    source_map: SourceMapMode,
    /// Per-path memoization, keyed by normalized absolute path.
    files: DashMap<PathBuf, CacheEntry>,
    /// Every file ever built, absolute output path -> emitted text.
    built: DashMap<PathBuf, String>,
    /// Outputs written during the current pass, relative to the source root.
    recompiled: Mutex<FxHashSet<PathBuf>>,
    /// Resource paths in flight for the compiler's staleness tracking.
    modified_resources: Mutex<FxHashSet<PathBuf>>,
    /// Rendezvous store for preprocessed styles; absent in plain builds.
    resources: Option<Arc<ResourceStore>>,
}

impl<H: CompilerHost> CachingHost<H> {
    pub fn new(delegate: H, options: &CompilerOptions, resources: Option<Arc<ResourceStore>>) -> Self {
        Self {
            delegate,
            source_root: normalize_path(&options.source_root),
            source_map: options.source_map,
            files: DashMap::new(),
            built: DashMap::new(),
            recompiled: Mutex::new(FxHashSet::default()),
            modified_resources: Mutex::new(FxHashSet::default()),
            resources,
        }
    }

    /// Drop the cache entry for a changed path, forcing every intercepted
    /// operation to recompute on the next pass. The parsed source handle
    /// dies with the entry.
    pub fn invalidate(&self, path: &Path) {
        self.files.remove(&normalize_path(path));
    }

    /// Clear the recompiled-outputs set before a pass.
    pub fn begin_pass(&self) {
        self.recompiled.lock().clear();
    }

    /// Outputs written during the current pass, relative to the source root.
    pub fn recompiled_outputs(&self) -> Vec<PathBuf> {
        let mut outputs: Vec<_> = self.recompiled.lock().iter().cloned().collect();
        outputs.sort();
        outputs
    }

    /// Mark a resource as in flight before requesting a recompile.
    pub fn mark_resource_modified(&self, path: PathBuf) {
        self.modified_resources.lock().insert(normalize_path(&path));
    }

    /// Drain the in-flight resource set after a pass completes.
    pub fn drain_modified_resources(&self) {
        self.modified_resources.lock().clear();
    }

    /// Built text for an exact output path, if that file was ever emitted.
    pub fn built_file(&self, path: &Path) -> Option<String> {
        self.built.get(&normalize_path(path)).map(|t| t.clone())
    }

    /// Snapshot of every built output (path, text). Used by full builds to
    /// flush compiled artifacts to disk.
    pub fn built_files(&self) -> Vec<(PathBuf, String)> {
        self.built
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn has_entry(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    #[cfg(test)]
    pub(crate) fn delegate_for_tests(&self) -> &H {
        &self.delegate
    }
}

impl<H: CompilerHost> CompilerHost for CachingHost<H> {
    fn file_exists(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        let mut entry = self.files.entry(path.clone()).or_default();
        if entry.exists.is_none() {
            entry.exists = Some(self.delegate.file_exists(&path));
        }
        entry.exists.unwrap_or(false)
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        let path = normalize_path(path);
        let mut entry = self.files.entry(path.clone()).or_default();
        if entry.content.is_none() {
            entry.content = self.delegate.read_file(&path);
        }
        entry.content.clone()
    }

    fn get_source_file(&self, path: &Path, lang: LangVersion) -> Option<Arc<SourceFile>> {
        let path = normalize_path(path);
        let mut entry = self.files.entry(path.clone()).or_default();
        if entry.source.is_none() {
            entry.source = self.delegate.get_source_file(&path, lang);
        }
        entry.source.clone()
    }

    fn write_file(&self, path: &Path, text: &str) {
        let path = normalize_path(path);
        let text = if self.source_map == SourceMapMode::External {
            strip_source_map_comment(text)
        } else {
            text.to_string()
        };

        let relative = path
            .strip_prefix(&self.source_root)
            .map_or_else(|_| path.clone(), Path::to_path_buf);
        self.recompiled.lock().insert(relative);
        self.built.insert(path, text);
    }

    async fn read_resource(&self, path: &Path) -> anyhow::Result<String> {
        let path = normalize_path(path);
        if let Some(entry) = self.files.get(&path)
            && let Some(content) = &entry.content
        {
            return Ok(content.clone());
        }

        // The entry guard must not be held across the rendezvous await.
        let content = match &self.resources {
            Some(store) if is_style(&path) && store.has_listener() => {
                store.request_style(&path).await?
            }
            _ => self.delegate.read_resource(&path).await?,
        };

        let mut entry = self.files.entry(path).or_default();
        if entry.content.is_none() {
            entry.content = Some(content.clone());
        }
        Ok(content)
    }

    fn modified_resource_files(&self) -> FxHashSet<PathBuf> {
        self.modified_resources.lock().clone()
    }
}

#[cfg(test)]
mod tests;
