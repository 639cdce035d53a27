//! Real-filesystem compiler host.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::{CompilerHost, LangVersion, SourceFile};

/// Delegate host backed by the local filesystem. Usually wrapped by
/// [`crate::host::CachingHost`], which memoizes every operation.
#[derive(Default)]
pub struct FsHost;

impl CompilerHost for FsHost {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn get_source_file(&self, path: &Path, lang: LangVersion) -> Option<Arc<SourceFile>> {
        let text = self.read_file(path)?;
        Some(Arc::new(SourceFile {
            path: path.to_path_buf(),
            text,
            lang,
        }))
    }

    fn write_file(&self, path: &Path, text: &str) {
        if let Some(parent) = path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            crate::log!("host"; "failed to create {}: {}", parent.display(), e);
            return;
        }
        if let Err(e) = fs::write(path, text) {
            crate::log!("host"; "failed to write {}: {}", path.display(), e);
        }
    }

    async fn read_resource(&self, path: &Path) -> anyhow::Result<String> {
        fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read resource {}: {}", path.display(), e))
    }
}
