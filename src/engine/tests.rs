use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Engine;
use crate::compiler::{
    CompilerFailure, CompilerHost, CompilerOptions, LangVersion, PassthroughCompiler, SourceMapMode,
};
use crate::diagnostics::{DEFAULT_ERROR_CODE, UNKNOWN_ERROR_CODE, has_errors};
use crate::host::CachingHost;
use crate::testkit::{FailingCompiler, MemoryHost};

const MAIN: &str = r#"import { App } from "./app";
App.start();
"#;
const APP: &str = r#"const component = { templateUrl: "./app.html" };
export const App = component;
"#;

fn options() -> CompilerOptions {
    CompilerOptions {
        source_root: PathBuf::from("/proj/src"),
        lang: LangVersion::default(),
        source_map: SourceMapMode::External,
    }
}

fn project() -> MemoryHost {
    let host = MemoryHost::new();
    host.insert("/proj/src/main.ts", MAIN);
    host.insert("/proj/src/app.ts", APP);
    host.insert("/proj/src/app.html", "<div></div>");
    host
}

fn engine(delegate: MemoryHost) -> Engine<PassthroughCompiler, MemoryHost> {
    let host = Arc::new(CachingHost::new(delegate, &options(), None));
    Engine::new(
        PassthroughCompiler,
        vec![PathBuf::from("/proj/src/main.ts")],
        options(),
        host,
    )
}

fn failing(delegate: MemoryHost) -> Engine<FailingCompiler, MemoryHost> {
    let host = Arc::new(CachingHost::new(delegate, &options(), None));
    Engine::new(
        FailingCompiler::new(),
        vec![PathBuf::from("/proj/src/main.ts")],
        options(),
        host,
    )
}

#[tokio::test]
async fn test_first_compile_emits_everything() {
    let mut engine = engine(project());
    let outcome = engine.compile().await;

    assert!(outcome.diagnostics.is_empty());
    assert!(outcome.emitted);
    assert_eq!(
        outcome.recompiled,
        vec![
            PathBuf::from("app.js"),
            PathBuf::from("app.js.map"),
            PathBuf::from("main.js"),
            PathBuf::from("main.js.map"),
        ]
    );
    assert!(engine.has_program());
}

#[tokio::test]
async fn test_recompile_covers_changed_file_and_importers() {
    let mut engine = engine(project());
    engine.compile().await;

    engine
        .host()
        .delegate_for_tests()
        .insert("/proj/src/app.ts", "export const App = {};");
    let outcome = engine.recompile(&[PathBuf::from("/proj/src/app.ts")]).await;

    // The changed module plus main.ts, which imports it directly.
    assert_eq!(
        outcome.recompiled,
        vec![
            PathBuf::from("app.js"),
            PathBuf::from("app.js.map"),
            PathBuf::from("main.js"),
            PathBuf::from("main.js.map"),
        ]
    );
}

#[tokio::test]
async fn test_recompile_of_leaf_change_stays_narrow() {
    let mut engine = engine(project());
    engine.compile().await;

    let changed = "import { App } from \"./app\";\nApp.start();\nconsole.log(1);\n";
    engine
        .host()
        .delegate_for_tests()
        .insert("/proj/src/main.ts", changed);
    let outcome = engine.recompile(&[PathBuf::from("/proj/src/main.ts")]).await;

    // Nothing imports main.ts, so app.ts is untouched.
    assert_eq!(
        outcome.recompiled,
        vec![PathBuf::from("main.js"), PathBuf::from("main.js.map")]
    );
}

#[tokio::test]
async fn test_unchanged_recompile_rewrites_nothing() {
    let mut engine = engine(project());
    engine.compile().await;

    let outcome = engine.recompile(&[]).await;

    assert!(outcome.emitted);
    assert!(outcome.recompiled.is_empty());
}

#[tokio::test]
async fn test_resource_change_recompiles_owning_component() {
    let mut engine = engine(project());
    engine.compile().await;

    engine
        .host()
        .delegate_for_tests()
        .insert("/proj/src/app.html", "<span></span>");
    let outcome = engine
        .recompile(&[PathBuf::from("/proj/src/app.html")])
        .await;

    assert_eq!(
        outcome.recompiled,
        vec![PathBuf::from("app.js"), PathBuf::from("app.js.map")]
    );
    // The in-flight set is drained once the pass completes.
    assert!(engine.host().modified_resource_files().is_empty());
}

#[tokio::test]
async fn test_missing_module_blocks_emission_keeps_program() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/main.ts", "import { x } from \"./nope\";");
    let mut engine = engine(delegate);

    let outcome = engine.compile().await;

    assert!(has_errors(&outcome.diagnostics));
    assert!(!outcome.emitted);
    assert!(outcome.recompiled.is_empty());
    // Diagnostics about the input do not void the program seed.
    assert!(engine.has_program());
}

#[tokio::test]
async fn test_syntax_failure_voids_program() {
    let mut engine = failing(project());
    engine.compile().await;
    assert!(engine.has_program());

    engine.compiler().fail_next(CompilerFailure::syntax("unexpected token"));
    let outcome = engine.recompile(&[PathBuf::from("/proj/src/app.ts")]).await;

    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].code, DEFAULT_ERROR_CODE);
    assert!(outcome.diagnostics[0].detail.is_none());
    assert!(!outcome.emitted);
    assert!(!engine.has_program());
}

#[tokio::test]
async fn test_internal_failure_voids_program_with_detail() {
    let mut engine = failing(project());
    engine.compile().await;

    engine
        .compiler()
        .fail_next(CompilerFailure::internal_with_detail("crashed", "at frame 3"));
    let outcome = engine.recompile(&[PathBuf::from("/proj/src/app.ts")]).await;

    assert_eq!(outcome.diagnostics[0].code, UNKNOWN_ERROR_CODE);
    assert_eq!(outcome.diagnostics[0].detail.as_deref(), Some("at frame 3"));
    assert!(!engine.has_program());

    // The pass after a failure starts from scratch and succeeds.
    let recovered = engine.compile().await;
    assert!(recovered.emitted);
    assert!(engine.has_program());
}

#[tokio::test]
async fn test_built_outputs_are_served_from_memory() {
    let mut engine = engine(project());
    engine.compile().await;

    let built = engine
        .host()
        .built_file(Path::new("/proj/src/main.js"))
        .unwrap();
    assert!(built.starts_with(MAIN));
    // Writes never reach the delegate filesystem in dev mode.
    assert!(engine.host().delegate_for_tests().written().is_empty());
}
