//! Reference compiler: structural passthrough.
//!
//! Discovers the module graph from the root inputs by following relative
//! `import`/`export ... from` specifiers, resolves component resources
//! (`templateUrl:` / `styleUrls:`), and emits each module's text unchanged
//! as `.js`. It performs no semantic analysis - that belongs to a real
//! compiler behind the same traits - but it honors the incremental
//! contract: with an old program supplied, only modules whose own text, a
//! direct import's text, or a referenced resource changed are re-emitted.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    Compiler, CompilerFailure, CompilerHost, CompilerOptions, EmitResult, Program, SourceMapMode,
};
use crate::diagnostics::{Diagnostic, DiagnosticSource};
use crate::utils::{is_resource, normalize_path, with_ext};

/// Cannot resolve an imported module.
const MISSING_MODULE: u32 = 2307;
/// Cannot read a referenced template or style resource.
const MISSING_RESOURCE: u32 = 2318;

static IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|export)\b[^'"\n]*\bfrom\s*['"]([^'"]+)['"]"#)
        .unwrap()
});
static BARE_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#).unwrap());
static TEMPLATE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"templateUrl\s*:\s*['"]([^'"]+)['"]"#).unwrap());
static STYLE_URLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"styleUrls?\s*:\s*(\[[^\]]*\]|['"][^'"]+['"])"#).unwrap());
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());

pub struct PassthroughCompiler;

#[derive(Debug, Clone)]
struct Module {
    text: String,
    imports: Vec<PathBuf>,
    resources: Vec<PathBuf>,
}

/// Text snapshot carried from one program to the next as the incremental
/// seed. Replaces the compiler's internal reuse of unchanged analysis.
#[derive(Debug, Default)]
struct Snapshot {
    texts: FxHashMap<PathBuf, String>,
    resources: FxHashMap<PathBuf, String>,
}

pub struct PassthroughProgram<H: CompilerHost> {
    host: Arc<H>,
    options: CompilerOptions,
    root_names: Vec<PathBuf>,
    previous: Snapshot,
    modules: FxHashMap<PathBuf, Module>,
    resource_texts: FxHashMap<PathBuf, String>,
    diagnostics: Vec<Diagnostic>,
    loaded: bool,
}

impl<H: CompilerHost> PassthroughProgram<H> {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            texts: self
                .modules
                .iter()
                .map(|(p, m)| (p.clone(), m.text.clone()))
                .collect(),
            resources: self.resource_texts.clone(),
        }
    }

    /// Resolve a relative import specifier against the importing file.
    /// Bare package specifiers are external and ignored.
    fn resolve_specifier(importer: &Path, spec: &str) -> Option<PathBuf> {
        if !spec.starts_with("./") && !spec.starts_with("../") {
            return None;
        }
        let base = importer.parent()?.join(spec);
        let resolved = if base.extension().is_none() {
            with_ext(&base, "ts")
        } else {
            base
        };
        Some(normalize_path(&resolved))
    }

    fn parse_module(path: &Path, text: &str) -> Module {
        let mut imports = Vec::new();
        for caps in IMPORT_FROM
            .captures_iter(text)
            .chain(BARE_IMPORT.captures_iter(text))
        {
            if let Some(resolved) = Self::resolve_specifier(path, &caps[1]) {
                imports.push(resolved);
            }
        }

        let mut resources = Vec::new();
        for caps in TEMPLATE_URL.captures_iter(text) {
            if let Some(resolved) = Self::resolve_specifier(path, &caps[1]) {
                resources.push(resolved);
            }
        }
        for caps in STYLE_URLS.captures_iter(text) {
            for url in QUOTED.captures_iter(&caps[1]) {
                if let Some(resolved) = Self::resolve_specifier(path, &url[1]) {
                    resources.push(resolved);
                }
            }
        }

        Module {
            text: text.to_string(),
            imports,
            resources,
        }
    }

    async fn load_resource(&mut self, owner: &Path, resource: PathBuf) {
        if self.resource_texts.contains_key(&resource) {
            return;
        }

        // Reuse the prior program's resource text unless the host reports
        // the file as modified in-flight.
        let modified = self.host.modified_resource_files();
        if !modified.contains(&resource)
            && let Some(prev) = self.previous.resources.get(&resource)
        {
            self.resource_texts.insert(resource, prev.clone());
            return;
        }

        match self.host.read_resource(&resource).await {
            Ok(text) => {
                self.resource_texts.insert(resource, text);
            }
            Err(e) => {
                let origin = if is_resource(&resource) {
                    DiagnosticSource::Template {
                        template: resource.clone(),
                        component: owner.to_path_buf(),
                    }
                } else {
                    DiagnosticSource::File(owner.to_path_buf())
                };
                self.diagnostics
                    .push(Diagnostic::error(MISSING_RESOURCE, e.to_string(), origin));
            }
        }
    }

    /// Whether a module's own text differs from the prior program's.
    fn text_changed(&self, path: &Path, module: &Module) -> bool {
        self.previous.texts.get(path) != Some(&module.text)
    }

    fn resources_changed(&self, module: &Module) -> bool {
        module.resources.iter().any(|r| {
            self.previous.resources.get(r) != self.resource_texts.get(r)
        })
    }

    fn source_map_for(&self, path: &Path) -> String {
        let file = with_ext(path, "js");
        let name = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        serde_json::json!({
            "version": 3,
            "file": name(&file),
            "sources": [name(path)],
            "names": [],
            "mappings": "",
        })
        .to_string()
    }
}

impl<H: CompilerHost> Program for PassthroughProgram<H> {
    async fn load_structure(&mut self) -> Result<(), CompilerFailure> {
        if self.loaded {
            return Ok(());
        }

        let mut queue: VecDeque<(PathBuf, Option<PathBuf>)> = self
            .root_names
            .iter()
            .map(|r| (normalize_path(r), None))
            .collect();
        let mut seen = FxHashSet::default();

        while let Some((path, importer)) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }

            let Some(source) = self.host.get_source_file(&path, self.options.lang) else {
                let owner = importer.unwrap_or_else(|| path.clone());
                self.diagnostics.push(Diagnostic::error(
                    MISSING_MODULE,
                    format!("cannot find module '{}'", path.display()),
                    DiagnosticSource::File(owner),
                ));
                continue;
            };

            let module = Self::parse_module(&path, &source.text);
            for import in &module.imports {
                queue.push_back((import.clone(), Some(path.clone())));
            }
            for resource in module.resources.clone() {
                self.load_resource(&path, resource).await;
            }
            self.modules.insert(path, module);
        }

        self.loaded = true;
        Ok(())
    }

    fn gather_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.clone()
    }

    fn emit(&mut self) -> Result<EmitResult, CompilerFailure> {
        for (path, module) in &self.modules {
            let dirty = self.text_changed(path, module)
                || module
                    .imports
                    .iter()
                    .any(|i| match self.modules.get(i) {
                        Some(imported) => self.text_changed(i, imported),
                        None => false,
                    })
                || self.resources_changed(module);
            if !dirty {
                continue;
            }

            let out = with_ext(path, "js");
            match self.options.source_map {
                SourceMapMode::External => {
                    let map_name = out
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let code = format!(
                        "{}\n//# sourceMappingURL={}.map\n",
                        module.text, map_name
                    );
                    self.host.write_file(&out, &code);
                    self.host
                        .write_file(&with_ext(path, "js.map"), &self.source_map_for(path));
                }
                SourceMapMode::None | SourceMapMode::Inline => {
                    self.host.write_file(&out, &module.text);
                }
            }
        }
        Ok(EmitResult::default())
    }
}

impl<H: CompilerHost> Compiler<H> for PassthroughCompiler {
    type Program = PassthroughProgram<H>;

    fn create_program(
        &self,
        root_names: &[PathBuf],
        options: &CompilerOptions,
        host: Arc<H>,
        old_program: Option<Self::Program>,
    ) -> Result<Self::Program, CompilerFailure> {
        let previous = old_program
            .as_ref()
            .map(PassthroughProgram::snapshot)
            .unwrap_or_default();
        Ok(PassthroughProgram {
            host,
            options: options.clone(),
            root_names: root_names.to_vec(),
            previous,
            modules: FxHashMap::default(),
            resource_texts: FxHashMap::default(),
            diagnostics: Vec::new(),
            loaded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_specifier() {
        let importer = Path::new("/proj/src/app.ts");
        assert_eq!(
            PassthroughProgram::<crate::compiler::FsHost>::resolve_specifier(importer, "./main"),
            Some(PathBuf::from("/proj/src/main.ts"))
        );
        assert_eq!(
            PassthroughProgram::<crate::compiler::FsHost>::resolve_specifier(
                importer,
                "./app.html"
            ),
            Some(PathBuf::from("/proj/src/app.html"))
        );
        // Bare package specifiers are external
        assert_eq!(
            PassthroughProgram::<crate::compiler::FsHost>::resolve_specifier(importer, "core"),
            None
        );
    }

    #[test]
    fn test_parse_module_imports_and_resources() {
        let text = r#"
import { bootstrap } from "./main";
import "./polyfills";
export { Button } from "./widgets/button";

const component = {
  templateUrl: "./app.html",
  styleUrls: ["./app.scss", "./theme.css"],
};
"#;
        let module =
            PassthroughProgram::<crate::compiler::FsHost>::parse_module(Path::new("/p/src/app.ts"), text);
        assert_eq!(
            module.imports,
            vec![
                PathBuf::from("/p/src/main.ts"),
                PathBuf::from("/p/src/widgets/button.ts"),
                PathBuf::from("/p/src/polyfills.ts"),
            ]
        );
        assert_eq!(
            module.resources,
            vec![
                PathBuf::from("/p/src/app.html"),
                PathBuf::from("/p/src/app.scss"),
                PathBuf::from("/p/src/theme.css"),
            ]
        );
    }
}
