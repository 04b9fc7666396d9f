//! Jar merging through `merge_archives`.

use jarwright::entry_path::PLUGIN_CACHE_PATH;
use jarwright::merge::DEFAULT_EXCLUDES;
use jarwright::{DuplicatePolicy, Error, MergeOptions, PluginCache, PluginEntry, merge_archives};

mod common;

use common::{class_bytes, create_jar, jar_files, open_jar, read_text, temp_dir};

const SERVICE: &str = "META-INF/services/X";

fn two_jars(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let a = create_jar(
        dir,
        "a.jar",
        &[
            ("p", b"from-a"),
            ("a/A.class", &class_bytes("a/A")),
            (SERVICE, b"a.Impl1"),
        ],
    )
    .unwrap();
    let b = create_jar(
        dir,
        "b.jar",
        &[
            ("p", b"from-b"),
            ("b/B.class", &class_bytes("b/B")),
            (SERVICE, b"#comment\nb.Impl2"),
        ],
    )
    .unwrap();
    (a, b)
}

#[test]
fn test_fail_policy_reports_conflict_and_writes_nothing() {
    let dir = temp_dir();
    let (a, b) = two_jars(dir.path());
    let output = dir.path().join("merged.jar");

    let err = merge_archives(&a, &[&b], &output, &MergeOptions::new()).unwrap_err();
    match err {
        Error::DuplicateConflict { archive, path } => {
            assert_eq!(path, "p");
            assert!(archive.ends_with("b.jar"), "unexpected archive {}", archive);
        }
        other => panic!("expected DuplicateConflict, got {:?}", other),
    }
    assert!(!output.exists());
}

#[test]
fn test_overwrite_policy_keeps_later_bytes() {
    let dir = temp_dir();
    let (a, b) = two_jars(dir.path());
    let output = dir.path().join("merged.jar");

    let options = MergeOptions::new().duplicate_policy(DuplicatePolicy::Overwrite);
    let result = merge_archives(&a, &[&b], &output, &options).unwrap();

    assert_eq!(read_text(&output, "p"), "from-b");
    assert_eq!(result.entries_overwritten, 1);
    assert_eq!(
        jar_files(&output),
        vec!["META-INF/services/X", "a/A.class", "b/B.class", "p"]
    );
}

#[test]
fn test_skip_policies_keep_earlier_bytes() {
    for policy in [DuplicatePolicy::Skip, DuplicatePolicy::Warn] {
        let dir = temp_dir();
        let (a, b) = two_jars(dir.path());
        let output = dir.path().join("merged.jar");

        let options = MergeOptions::new().duplicate_policy(policy);
        let result = merge_archives(&a, &[&b], &output, &options).unwrap();

        assert_eq!(read_text(&output, "p"), "from-a", "policy {}", policy);
        assert_eq!(result.entries_skipped, 1);
    }
}

#[test]
fn test_service_files_concatenate_in_order() {
    let dir = temp_dir();
    let (a, b) = two_jars(dir.path());
    let output = dir.path().join("merged.jar");

    let options = MergeOptions::new().duplicate_policy(DuplicatePolicy::Skip);
    let result = merge_archives(&a, &[&b], &output, &options).unwrap();

    let lines: Vec<String> = read_text(&output, SERVICE).lines().map(str::to_string).collect();
    assert_eq!(lines, vec!["a.Impl1", "#comment", "b.Impl2"]);
    assert_eq!(result.services_merged, 1);
    // service merging happens ahead of the duplicate policy
    assert_eq!(result.entries_skipped, 1);
}

#[test]
fn test_plugin_caches_merge_first_wins() {
    let dir = temp_dir();
    let mut first = PluginCache::new();
    first.insert("core", "console", PluginEntry::new("a.Console", "Console", true, false));
    let mut second = PluginCache::new();
    second.insert("core", "console", PluginEntry::new("b.Console", "Console", true, false));
    second.insert("lookup", "env", PluginEntry::new("b.Env", "env", false, true));

    let a = create_jar(dir.path(), "a.jar", &[(PLUGIN_CACHE_PATH, &first.encode().unwrap())]).unwrap();
    let b = create_jar(dir.path(), "b.jar", &[(PLUGIN_CACHE_PATH, &second.encode().unwrap())]).unwrap();
    let output = dir.path().join("merged.jar");

    let result = merge_archives(&a, &[&b], &output, &MergeOptions::new()).unwrap();
    assert_eq!(result.plugin_caches_merged, 1);

    let cache = PluginCache::decode(open_jar(&output).read(PLUGIN_CACHE_PATH).unwrap()).unwrap();
    assert_eq!(cache.get("core", "console").unwrap().class_name, "a.Console");
    assert_eq!(cache.get("lookup", "env").unwrap().class_name, "b.Env");
}

#[test]
fn test_corrupt_plugin_cache_fails_merge() {
    let dir = temp_dir();
    let mut cache = PluginCache::new();
    cache.insert("core", "x", PluginEntry::new("a.X", "X", false, false));
    let a = create_jar(dir.path(), "a.jar", &[(PLUGIN_CACHE_PATH, &cache.encode().unwrap())]).unwrap();
    let b = create_jar(dir.path(), "b.jar", &[(PLUGIN_CACHE_PATH, b"\x00\x00\x00\x05\x00")]).unwrap();

    let err = merge_archives(&a, &[&b], dir.path().join("out.jar"), &MergeOptions::new()).unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(err.entry_path(), Some(PLUGIN_CACHE_PATH));
}

#[test]
fn test_default_excludes_drop_signatures() {
    let dir = temp_dir();
    let a = create_jar(
        dir.path(),
        "a.jar",
        &[
            ("META-INF/SIGNER.SF", b"sig"),
            ("META-INF/signer.rsa", b"sig"),
            ("module-info.class", b"module"),
            ("a/A.class", &class_bytes("a/A")),
        ],
    )
    .unwrap();
    let b = create_jar(dir.path(), "b.jar", &[("META-INF/OTHER.DSA", b"sig")]).unwrap();
    let output = dir.path().join("merged.jar");

    let options = MergeOptions::new().with_default_excludes().unwrap();
    let result = merge_archives(&a, &[&b], &output, &options).unwrap();

    assert_eq!(jar_files(&output), vec!["a/A.class"]);
    assert_eq!(result.entries_excluded, 4);
    assert_eq!(DEFAULT_EXCLUDES.len(), 4);
}

#[test]
fn test_custom_exclude_globs() {
    let dir = temp_dir();
    let a = create_jar(
        dir.path(),
        "a.jar",
        &[
            ("docs/readme.txt", b"x"),
            ("docs/deep/notes.txt", b"x"),
            ("a/A.class", &class_bytes("a/A")),
        ],
    )
    .unwrap();
    let output = dir.path().join("merged.jar");

    let no_others: &[&std::path::Path] = &[];
    let options = MergeOptions::new().exclude("**/*.txt").unwrap();
    merge_archives(&a, no_others, &output, &options).unwrap();

    assert_eq!(jar_files(&output), vec!["a/A.class"]);
}

#[test]
fn test_missing_input_leaves_no_output() {
    let dir = temp_dir();
    let (a, _) = two_jars(dir.path());
    let output = dir.path().join("merged.jar");

    let err = merge_archives(&a, &[dir.path().join("absent.jar")], &output, &MergeOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::ArchiveNotFound { .. }));
    assert!(!output.exists());
}

#[test]
fn test_output_parents_created_and_replaced() {
    let dir = temp_dir();
    let (a, b) = two_jars(dir.path());
    let output = dir.path().join("build/libs/merged.jar");
    let options = MergeOptions::new().duplicate_policy(DuplicatePolicy::Overwrite);

    merge_archives(&a, &[&b], &output, &options).unwrap();
    // a second merge starts from scratch rather than accumulating
    merge_archives(&b, &[&a], &output, &options).unwrap();

    assert_eq!(read_text(&output, "p"), "from-a");
    assert_eq!(read_text(&output, SERVICE), "#comment\nb.Impl2\na.Impl1");
}
