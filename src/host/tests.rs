use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::CachingHost;
use crate::compiler::{CompilerHost, CompilerOptions, LangVersion, SourceMapMode};
use crate::resource::ResourceStore;
use crate::testkit::MemoryHost;

fn options() -> CompilerOptions {
    CompilerOptions {
        source_root: PathBuf::from("/proj/src"),
        lang: LangVersion::default(),
        source_map: SourceMapMode::External,
    }
}

fn caching(delegate: MemoryHost) -> CachingHost<MemoryHost> {
    CachingHost::new(delegate, &options(), None)
}

#[test]
fn test_reads_consult_delegate_once() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/app.ts", "export {}");
    let host = caching(delegate);

    for _ in 0..3 {
        assert_eq!(host.read_file(Path::new("/proj/src/app.ts")).unwrap(), "export {}");
        assert!(host.file_exists(Path::new("/proj/src/app.ts")));
        assert!(host
            .get_source_file(Path::new("/proj/src/app.ts"), LangVersion::EsNext)
            .is_some());
    }

    // read_file populated content; exists and source each cost one more.
    assert_eq!(host.delegate.read_count("/proj/src/app.ts"), 3);
}

#[test]
fn test_negative_exists_is_cached() {
    let host = caching(MemoryHost::new());

    assert!(!host.file_exists(Path::new("/proj/src/missing.ts")));
    assert!(!host.file_exists(Path::new("/proj/src/missing.ts")));
    assert_eq!(host.delegate.read_count("/proj/src/missing.ts"), 1);
}

#[test]
fn test_stale_read_until_invalidated() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/app.ts", "v1");
    let host = caching(delegate);

    assert_eq!(host.read_file(Path::new("/proj/src/app.ts")).unwrap(), "v1");
    host.delegate.insert("/proj/src/app.ts", "v2");

    // Still the memoized text until the entry is dropped.
    assert_eq!(host.read_file(Path::new("/proj/src/app.ts")).unwrap(), "v1");
    host.invalidate(Path::new("/proj/src/app.ts"));
    assert_eq!(host.read_file(Path::new("/proj/src/app.ts")).unwrap(), "v2");
}

#[test]
fn test_invalidate_is_selective() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/a.ts", "a");
    delegate.insert("/proj/src/b.ts", "b");
    let host = caching(delegate);

    host.read_file(Path::new("/proj/src/a.ts"));
    host.read_file(Path::new("/proj/src/b.ts"));
    host.invalidate(Path::new("/proj/src/a.ts"));

    assert!(!host.has_entry(Path::new("/proj/src/a.ts")));
    assert!(host.has_entry(Path::new("/proj/src/b.ts")));
}

#[test]
fn test_writes_are_intercepted_and_tracked() {
    let host = caching(MemoryHost::new());
    host.begin_pass();

    host.write_file(Path::new("/proj/src/app.js"), "var x;");
    host.write_file(Path::new("/proj/src/widgets/button.js"), "var y;");

    // Nothing reaches the delegate.
    assert!(host.delegate.written().is_empty());
    assert_eq!(
        host.recompiled_outputs(),
        vec![PathBuf::from("app.js"), PathBuf::from("widgets/button.js")]
    );
    assert_eq!(host.built_file(Path::new("/proj/src/app.js")).unwrap(), "var x;");
}

#[test]
fn test_begin_pass_resets_recompiled_but_keeps_built() {
    let host = caching(MemoryHost::new());

    host.begin_pass();
    host.write_file(Path::new("/proj/src/app.js"), "var x;");
    host.begin_pass();

    assert!(host.recompiled_outputs().is_empty());
    assert!(host.built_file(Path::new("/proj/src/app.js")).is_some());
}

#[test]
fn test_source_map_comment_stripped_in_external_mode() {
    let host = caching(MemoryHost::new());
    host.write_file(
        Path::new("/proj/src/app.js"),
        "var x;\n//# sourceMappingURL=app.js.map\n",
    );
    assert_eq!(host.built_file(Path::new("/proj/src/app.js")).unwrap(), "var x;\n\n");
}

#[test]
fn test_source_map_comment_kept_in_inline_mode() {
    let mut opts = options();
    opts.source_map = SourceMapMode::Inline;
    let host = CachingHost::new(MemoryHost::new(), &opts, None);

    let text = "var x;\n//# sourceMappingURL=data:application/json;base64,e30=\n";
    host.write_file(Path::new("/proj/src/app.js"), text);
    assert_eq!(host.built_file(Path::new("/proj/src/app.js")).unwrap(), text);
}

#[tokio::test]
async fn test_resource_read_memoized() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/app.html", "<div/>");
    let host = caching(delegate);

    assert_eq!(
        host.read_resource(Path::new("/proj/src/app.html")).await.unwrap(),
        "<div/>"
    );
    assert_eq!(
        host.read_resource(Path::new("/proj/src/app.html")).await.unwrap(),
        "<div/>"
    );
    assert_eq!(host.delegate.read_count("/proj/src/app.html"), 1);
}

#[tokio::test]
async fn test_style_read_rendezvous_when_listener_present() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/app.scss", "raw scss");
    let store = Arc::new(ResourceStore::new());
    let mut requests = store.subscribe();
    let host = Arc::new(CachingHost::new(delegate, &options(), Some(store.clone())));

    let read = {
        let host = host.clone();
        tokio::spawn(async move { host.read_resource(Path::new("/proj/src/app.scss")).await })
    };

    // The request is announced instead of read from the delegate.
    let announced = requests.recv().await.unwrap();
    assert_eq!(announced, PathBuf::from("/proj/src/app.scss"));
    store.submit_style(&announced, ".a{}");

    assert_eq!(read.await.unwrap().unwrap(), ".a{}");
    assert_eq!(host.delegate.read_count("/proj/src/app.scss"), 0);
}

#[tokio::test]
async fn test_style_read_falls_back_without_listener() {
    let delegate = MemoryHost::new();
    delegate.insert("/proj/src/app.scss", "raw scss");
    let store = Arc::new(ResourceStore::new());
    let host = CachingHost::new(delegate, &options(), Some(store));

    assert_eq!(
        host.read_resource(Path::new("/proj/src/app.scss")).await.unwrap(),
        "raw scss"
    );
}

#[test]
fn test_modified_resources_round_trip() {
    let host = caching(MemoryHost::new());

    host.mark_resource_modified(PathBuf::from("/proj/src/app.scss"));
    assert!(host
        .modified_resource_files()
        .contains(Path::new("/proj/src/app.scss")));

    host.drain_modified_resources();
    assert!(host.modified_resource_files().is_empty());
}
