use dirsum_core::algorithm::Algorithm;
use dirsum_core::error::{exit, Error};
use dirsum_core::manifest::ManifestFormat;
use dirsum_core::verify::{Class, Status};
use dirsum_core::walk::WalkConfig;
use dirsum_core::{verify, BuildOptions, Builder, VerifyOptions};
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

fn release_tree() -> (tempfile::TempDir, PathBuf) {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("release");
    fs::create_dir_all(root.join("docs/api")).unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.txt"), "bravo").unwrap();
    fs::write(root.join("docs/guide.md"), "# guide").unwrap();
    fs::write(root.join("docs/api/index.html"), vec![7u8; 10_000]).unwrap();
    (td, root)
}

fn recursive(alg: Algorithm) -> BuildOptions {
    BuildOptions {
        algorithm: alg,
        walk: WalkConfig { recursive: true, ..WalkConfig::default() },
        ..BuildOptions::default()
    }
}

fn flip_byte(path: &Path, at: u64) {
    let mut f = OpenOptions::new().read(true).write(true).open(path).unwrap();
    let mut b = [0u8; 1];
    f.seek(SeekFrom::Start(at)).unwrap();
    std::io::Read::read_exact(&mut f, &mut b).unwrap();
    f.seek(SeekFrom::Start(at)).unwrap();
    f.write_all(&[b[0] ^ 0xFF]).unwrap();
}

#[test]
fn unchanged_tree_verifies_completely() {
    let (_td, root) = release_tree();
    for alg in Algorithm::SEARCH_ORDER {
        let out = Builder::build(&root, &recursive(alg)).unwrap();
        assert_eq!(out.manifest.total_files, 4);
        let written = out.written_to.unwrap();
        assert_eq!(written.file_name().unwrap().to_str().unwrap(), format!("release.{}", alg.extension()));

        let opts = VerifyOptions {
            manifest: Some(written.clone()),
            include_untracked: true,
            ..VerifyOptions::default()
        };
        let rec = verify(&root, &opts).unwrap();
        assert_eq!(rec.algorithm, alg);
        assert_eq!(rec.summary.verified, 4, "{alg}");
        assert_eq!(rec.summary.invalid, 0);
        assert_eq!(rec.summary.missing, 0);
        // other manifests from earlier iterations are on disk but not listed
        assert!(rec.in_class(Class::Untracked).all(|e| e.path.starts_with("release.")));
        assert!(rec.passed());
        assert_eq!(rec.exit_code(), exit::SUCCESS);
        fs::remove_file(written).unwrap();
    }
}

#[test]
fn edited_file_is_the_only_invalid_entry() {
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap();
    flip_byte(&root.join("docs/api/index.html"), 4_321);

    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.summary.verified, 3);
    assert_eq!(rec.summary.invalid, 1);
    let bad = rec.get("docs/api/index.html").unwrap();
    assert_eq!(bad.status, Status::Found);
    assert!(!bad.verified);
    assert_ne!(bad.verify_hash.as_deref(), Some(bad.recorded.as_ref().unwrap().hash.as_str()));
    assert_eq!(bad.verify_size, Some(10_000));
    assert!(!rec.passed());
    assert_eq!(rec.exit_code(), exit::VERIFY_FAILED);
}

#[test]
fn two_file_sha256_example() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("pair");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("a.txt"), "one").unwrap();
    fs::write(root.join("b.txt"), "two").unwrap();

    let out = Builder::build(&root, &BuildOptions::default()).unwrap();
    assert_eq!(out.manifest.algorithm, Algorithm::Sha256);
    assert_eq!(out.manifest.total_files, 2);
    assert!(out.manifest.files.iter().all(|f| f.hash.len() == 64));

    fs::write(root.join("b.txt"), "TWO").unwrap();
    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.summary.verified, 1);
    assert_eq!(rec.summary.invalid, 1);
    assert_eq!(rec.summary.missing, 0);
    assert_eq!(rec.get("a.txt").unwrap().class(), Class::Verified);
    assert_eq!(rec.get("b.txt").unwrap().class(), Class::Invalid);
    assert!(!rec.passed());
}

#[test]
fn deleted_file_is_missing_unless_ignored() {
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Sha1)).unwrap();
    fs::remove_file(root.join("docs/guide.md")).unwrap();

    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.summary.missing, 1);
    assert_eq!(rec.get("docs/guide.md").unwrap().status, Status::Missing);
    assert!(!rec.passed());

    let opts = VerifyOptions { ignore_missing: true, ..VerifyOptions::default() };
    let rec = verify(&root, &opts).unwrap();
    assert_eq!(rec.summary.missing, 1);
    assert!(rec.passed());
}

#[test]
fn directory_in_place_of_file_counts_as_missing() {
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Md5)).unwrap();
    fs::remove_file(root.join("b.txt")).unwrap();
    fs::create_dir(root.join("b.txt")).unwrap();
    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.get("b.txt").unwrap().class(), Class::Missing);
}

#[test]
fn new_file_is_untracked_and_harmless() {
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Sha512)).unwrap();
    fs::write(root.join("docs/new.txt"), "fresh").unwrap();

    let opts =
        VerifyOptions { include_untracked: true, recursive: true, ..VerifyOptions::default() };
    let rec = verify(&root, &opts).unwrap();
    let untracked: Vec<&str> = rec.in_class(Class::Untracked).map(|e| e.path.as_str()).collect();
    assert_eq!(untracked, vec!["docs/new.txt"]);
    let e = rec.get("docs/new.txt").unwrap();
    assert!(e.recorded.is_none());
    assert!(e.verify_hash.is_none());
    assert_eq!(e.verify_size, Some(5));
    assert_eq!(rec.summary.verified, 4);
    assert!(rec.passed());

    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.summary.untracked, 0);
}

#[test]
fn exclude_beats_include_when_building() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().join("notes");
    fs::create_dir(&root).unwrap();
    for name in ["todo.txt", "secret.txt", "Secret.TXT.bak", "photo.png", "README.TXT"] {
        fs::write(root.join(name), name).unwrap();
    }
    let opts = BuildOptions {
        walk: WalkConfig {
            include: vec!["*.txt".into()],
            exclude: vec!["secret.txt".into()],
            ..WalkConfig::default()
        },
        no_write: true,
        ..BuildOptions::default()
    };
    let out = Builder::build(&root, &opts).unwrap();
    let mut paths: Vec<&str> = out.manifest.files.iter().map(|f| f.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["README.TXT", "todo.txt"]);
}

#[test]
fn manifest_never_lists_or_checks_itself() {
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap();
    // Second build runs with the first manifest already on disk.
    let out = Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap();
    assert!(out.manifest.files.iter().all(|f| f.path != "release.sha256"));
    assert_eq!(out.manifest.total_files, 4);

    // A hand-edited manifest that names itself is still skipped.
    let mpath = root.join("release.sha256");
    let mut v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&mpath).unwrap()).unwrap();
    v["Files"].as_array_mut().unwrap().push(serde_json::json!({
        "Path": "release.sha256",
        "Hash": "0".repeat(64),
        "Date": "2024-01-01T00:00:00Z",
        "Size": 1
    }));
    v["TotalFiles"] = serde_json::json!(5);
    fs::write(&mpath, serde_json::to_string(&v).unwrap()).unwrap();

    let opts = VerifyOptions { include_untracked: true, ..VerifyOptions::default() };
    let rec = verify(&root, &opts).unwrap();
    assert!(rec.get("release.sha256").is_none());
    assert_eq!(rec.summary.verified, 4);
    assert_eq!(rec.summary.untracked, 0);
    assert!(rec.passed());
}

#[test]
fn no_write_returns_text_and_leaves_disk_alone() {
    let (_td, root) = release_tree();
    let opts = BuildOptions { no_write: true, ..recursive(Algorithm::Sha384) };
    let out = Builder::build(&root, &opts).unwrap();
    assert!(out.written_to.is_none());
    assert!(!root.join("release.sha384").exists());
    let v: serde_json::Value = serde_json::from_str(&out.serialized).unwrap();
    assert_eq!(v["Algorithm"], "SHA384");
    assert_eq!(v["TotalFiles"], 4);
    assert_eq!(v["HiddenFiles"], false);
    assert_eq!(v["OriginalLocation"], out.manifest.original_location);
}

#[test]
fn manifest_order_follows_traversal() {
    let (_td, root) = release_tree();
    let out = Builder::build(&root, &recursive(Algorithm::Sha1)).unwrap();
    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    let listed: Vec<&str> = out.manifest.files.iter().map(|f| f.path.as_str()).collect();
    let checked: Vec<&str> = rec.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(listed, checked);
}

#[test]
fn simple_listing_cannot_be_verified() {
    let (_td, root) = release_tree();
    let opts = BuildOptions { format: ManifestFormat::Simple, ..recursive(Algorithm::Md5) };
    let out = Builder::build(&root, &opts).unwrap();
    let text = fs::read_to_string(out.written_to.unwrap()).unwrap();
    assert!(text.lines().any(|l| l.starts_with("MD5  ") && l.ends_with("  docs/guide.md")));

    let err = verify(&root, &VerifyOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
    assert_eq!(err.exit_code(), exit::RUNTIME);
}

#[test]
fn hidden_files_follow_manifest_unless_overridden() {
    let (_td, root) = release_tree();
    fs::write(root.join(".env"), "SECRET=1").unwrap();
    let out = Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap();
    assert!(out.manifest.files.iter().all(|f| f.path != ".env"));
    assert!(!out.manifest.hidden_files);

    let opts = VerifyOptions { include_untracked: true, ..VerifyOptions::default() };
    let rec = verify(&root, &opts).unwrap();
    assert_eq!(rec.summary.untracked, 0);

    let opts = VerifyOptions { hidden_override: Some(true), ..opts };
    let rec = verify(&root, &opts).unwrap();
    assert_eq!(rec.get(".env").unwrap().class(), Class::Untracked);
    assert!(rec.passed());
}

#[test]
fn hidden_build_records_flag_and_files() {
    let (_td, root) = release_tree();
    fs::create_dir(root.join(".git")).unwrap();
    fs::write(root.join(".git/HEAD"), "ref").unwrap();
    let mut opts = recursive(Algorithm::Sha1);
    opts.walk.include_hidden = true;
    let out = Builder::build(&root, &opts).unwrap();
    assert!(out.manifest.hidden_files);
    assert!(out.manifest.files.iter().any(|f| f.path == ".git/HEAD"));
    let rec = verify(&root, &VerifyOptions { include_untracked: true, ..VerifyOptions::default() })
        .unwrap();
    assert_eq!(rec.summary.verified, 5);
    assert_eq!(rec.summary.untracked, 0);
}

#[test]
fn missing_root_fails_before_any_work() {
    let td = tempfile::tempdir().unwrap();
    let err = Builder::build(&td.path().join("absent"), &BuildOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Path { .. }));
    let err = verify(&td.path().join("absent"), &VerifyOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Path { .. }));
}

#[test]
fn no_manifest_is_not_found() {
    let (_td, root) = release_tree();
    let err = verify(&root, &VerifyOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.exit_code(), exit::NOT_FOUND);
}

#[test]
fn bad_glob_aborts_build() {
    let (_td, root) = release_tree();
    let opts = BuildOptions {
        walk: WalkConfig { exclude: vec!["[".into()], ..WalkConfig::default() },
        ..BuildOptions::default()
    };
    assert!(matches!(Builder::build(&root, &opts), Err(Error::Pattern { .. })));
    assert!(!root.join("release.sha256").exists());
}

#[cfg(unix)]
#[test]
fn unreadable_entry_aborts_build_without_output() {
    let (_td, root) = release_tree();
    std::os::unix::fs::symlink(root.join("gone.bin"), root.join("dangling.bin")).unwrap();
    let err = Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
    assert!(!root.join("release.sha256").exists());
}

#[test]
fn strict_mode_rejects_incomplete_manifest() {
    let (_td, root) = release_tree();
    let hash = dirsum_core::hasher::digest(&root.join("a.txt"), Algorithm::Md5).unwrap();
    let text = format!(r#"{{"Algorithm":"MD5","Files":[{{"Path":"a.txt","Hash":"{hash}"}}]}}"#);
    fs::write(root.join("release.md5"), text).unwrap();

    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert!(!rec.warnings.is_empty());
    assert_eq!(rec.summary.verified, 1);
    assert!(rec.passed());

    let strict = VerifyOptions { strict: true, ..VerifyOptions::default() };
    assert!(matches!(verify(&root, &strict), Err(Error::Format { .. })));
}

#[test]
fn traversal_paths_in_manifest_are_not_followed() {
    let (_td, root) = release_tree();
    let text = r#"{"Algorithm":"SHA1","Date":"2024-01-01T00:00:00Z","Files":[
        {"Path":"../outside.txt","Hash":"a9993e364706816aba3e25717850c26c9cd0d89d","Date":"2024-01-01T00:00:00Z","Size":3}
    ],"TotalFiles":1,"OriginalLocation":"/x","HiddenFiles":false}"#;
    fs::write(root.parent().unwrap().join("outside.txt"), "abc").unwrap();
    fs::write(root.join("release.sha1"), text).unwrap();
    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.summary.missing, 1);
    assert!(rec.warnings.iter().any(|w| w.message.contains("parent traversal")));
}

#[test]
fn uppercase_and_backslash_manifest_entries_still_verify() {
    let (_td, root) = release_tree();
    let hash = dirsum_core::hasher::digest(&root.join("docs/guide.md"), Algorithm::Sha256)
        .unwrap()
        .to_uppercase();
    let text = format!(
        "\u{feff}{{\"Algorithm\":\"SHA256\",\"Date\":\"/Date(1577836800000)/\",\"Files\":[{{\"Path\":\"docs\\\\guide.md\",\"Hash\":\"{hash}\",\"Date\":\"/Date(1577836800000)/\",\"Size\":7}}],\"TotalFiles\":1,\"OriginalLocation\":\"C:\\\\release\",\"HiddenFiles\":false}}"
    );
    fs::write(root.join("release.sha256"), text).unwrap();
    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert!(rec.warnings.is_empty(), "{:?}", rec.warnings);
    assert_eq!(rec.get("docs/guide.md").unwrap().class(), Class::Verified);
}

#[test]
fn default_build_and_verify_agree_on_depth() {
    let (_td, root) = release_tree();
    let out = Builder::build(&root, &BuildOptions::default()).unwrap();
    let mut listed: Vec<&str> = out.manifest.files.iter().map(|f| f.path.as_str()).collect();
    listed.sort();
    assert_eq!(listed, vec!["a.txt", "b.txt"]);

    let opts = VerifyOptions { include_untracked: true, ..VerifyOptions::default() };
    let rec = verify(&root, &opts).unwrap();
    assert_eq!(rec.summary.verified, 2);
    assert_eq!(rec.summary.untracked, 0);

    let deep = VerifyOptions { recursive: true, ..opts };
    let rec = verify(&root, &deep).unwrap();
    assert_eq!(rec.summary.untracked, 2);
    assert!(rec.passed());
}

#[cfg(unix)]
#[test]
fn dangling_link_does_not_break_untracked_scan() {
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap();
    std::os::unix::fs::symlink(root.join("gone.bin"), root.join("docs/dangling.bin")).unwrap();
    std::os::unix::fs::symlink(&root, root.join("docs/api/back")).unwrap();
    fs::write(root.join("docs/late.txt"), "late").unwrap();

    let opts =
        VerifyOptions { include_untracked: true, recursive: true, ..VerifyOptions::default() };
    let rec = verify(&root, &opts).unwrap();
    let untracked: Vec<&str> = rec.in_class(Class::Untracked).map(|e| e.path.as_str()).collect();
    assert_eq!(untracked, vec!["docs/late.txt"]);
    assert_eq!(rec.summary.verified, 4);
    assert!(rec.passed());
}

#[cfg(unix)]
#[test]
fn unreadable_tracked_file_is_fatal() {
    use std::os::unix::fs::PermissionsExt;
    let (_td, root) = release_tree();
    Builder::build(&root, &recursive(Algorithm::Sha256)).unwrap();
    let locked = root.join("docs/guide.md");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        // Privileged users read through mode bits; nothing to observe.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let err = verify(&root, &VerifyOptions::default()).unwrap_err();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    match &err {
        Error::Io { path, .. } => assert!(path.ends_with("docs/guide.md"), "{err}"),
        other => panic!("expected an I/O error, got {other}"),
    }
    assert_eq!(err.exit_code(), exit::RUNTIME);
}

#[test]
fn duplicate_entries_are_each_checked() {
    let (_td, root) = release_tree();
    let good = dirsum_core::hasher::digest(&root.join("a.txt"), Algorithm::Sha1).unwrap();
    let bad = "0".repeat(40);
    let entry = |hash: &str| {
        serde_json::json!({"Path": "a.txt", "Hash": hash, "Date": "2024-01-01T00:00:00Z", "Size": 5})
    };
    let doc = serde_json::json!({
        "Algorithm": "SHA1",
        "Date": "2024-01-01T00:00:00Z",
        "Files": [entry(&good), entry(&bad)],
        "TotalFiles": 2,
        "OriginalLocation": "/release",
        "HiddenFiles": false
    });
    fs::write(root.join("release.sha1"), doc.to_string()).unwrap();

    let rec = verify(&root, &VerifyOptions::default()).unwrap();
    assert_eq!(rec.entries.len(), 2);
    assert_eq!(rec.summary.verified, 1);
    assert_eq!(rec.summary.invalid, 1);
    assert!(rec.warnings.iter().any(|w| w.message.contains("duplicate")));
    assert_eq!(rec.get("a.txt").unwrap().class(), Class::Verified);
    assert!(!rec.passed());
}
