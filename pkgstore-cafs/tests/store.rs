// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use filetime::FileTime;
use pkgstore_cafs::{CheckOptions, Store, StoreError};
use pkgstore_store_core::{FilesMap, PackageFileRecord, PackageFilesIndex, SideEffects};
use pkgstore_utils_hash::Algorithm;
use pkgstore_utils_test::CanonicalTempDir;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

async fn add(store: &Store, content: &'static [u8], mode: u32) -> PackageFileRecord {
    let written = store
        .write_buffer(Bytes::from_static(content), mode)
        .await
        .unwrap();
    PackageFileRecord {
        integrity: written.integrity,
        mode,
        size: content.len() as u64,
        checked_at: Some(written.checked_at),
    }
}

/// A record for content that was never written.
fn absent(content: &[u8]) -> PackageFileRecord {
    PackageFileRecord {
        integrity: Algorithm::SHA512.digest(content),
        mode: 0o644,
        size: content.len() as u64,
        checked_at: None,
    }
}

fn content_path(store: &Store, record: &PackageFileRecord) -> PathBuf {
    store.file_path_by_mode(&record.integrity, record.mode)
}

fn push_mtime(path: &Path, checked_at: u64, delta_ms: u64) {
    let ms = checked_at + delta_ms;
    let mtime = FileTime::from_unix_time((ms / 1000) as i64, ((ms % 1000) * 1_000_000) as u32);
    filetime::set_file_mtime(path, mtime).unwrap();
}

#[test_log::test(tokio::test)]
async fn fresh_content_is_trusted_without_hashing() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let mut index = PackageFilesIndex::new(FilesMap::from([
        ("index.js".to_owned(), add(&store, b"module.exports=1", 0o644).await),
        ("bin/cli".to_owned(), add(&store, b"#!/bin/sh\n", 0o755).await),
    ]));
    assert_eq!(store.verified_file_count(), 0);

    let result = store.check_package_files(&mut index, false).await.unwrap();
    assert!(result.passed);
    assert!(result.manifest.is_none());
    assert_eq!(store.verified_file_count(), 0);
}

#[test_log::test(tokio::test)]
async fn modified_content_is_rehashed_and_removed() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let record = add(&store, b"original", 0o644).await;
    let path = content_path(&store, &record);

    // Same size, different bytes, mtime well past checkedAt.
    std::fs::write(&path, b"tampered").unwrap();
    push_mtime(&path, record.checked_at.unwrap(), 60_000);

    let mut index = PackageFilesIndex::new(FilesMap::from([("a".to_owned(), record.clone())]));
    let result = store.check_package_files(&mut index, false).await.unwrap();
    assert!(!result.passed);
    assert_eq!(store.verified_file_count(), 1);
    assert!(!path.exists());

    // A store without the ledger entry writes the content again.
    let reopened = Store::new(dir.path());
    reopened
        .write_buffer(Bytes::from_static(b"original"), 0o644)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"original");
}

#[test_log::test(tokio::test)]
#[rstest]
#[case::same_size(b"original", b"tampered", 1)]
#[case::size_mismatch(b"short", b"much longer content", 0)]
async fn tampered_content_is_removed(
    #[case] original: &'static [u8],
    #[case] tampered: &'static [u8],
    #[case] hashed: u64,
) {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let record = add(&store, original, 0o644).await;
    let path = content_path(&store, &record);

    std::fs::write(&path, tampered).unwrap();
    push_mtime(&path, record.checked_at.unwrap(), 60_000);

    let mut index = PackageFilesIndex::new(FilesMap::from([("a".to_owned(), record)]));
    assert!(!store.check_package_files(&mut index, false).await.unwrap().passed);
    assert_eq!(store.verified_file_count(), hashed);
    assert!(!path.exists());
}

#[test_log::test(tokio::test)]
async fn missing_content_fails() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let mut index =
        PackageFilesIndex::new(FilesMap::from([("gone.js".to_owned(), absent(b"gone"))]));

    let result = store.check_package_files(&mut index, false).await.unwrap();
    assert!(!result.passed);
}

#[test_log::test(tokio::test)]
async fn duplicate_content_is_verified_once() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let mut record = add(&store, b"same", 0o644).await;
    record.checked_at = None;

    let mut index = PackageFilesIndex::new(FilesMap::from([
        ("a.js".to_owned(), record.clone()),
        ("b.js".to_owned(), record),
    ]));
    assert!(store.check_package_files(&mut index, false).await.unwrap().passed);
    assert_eq!(store.verified_file_count(), 1);
}

#[test_log::test(tokio::test)]
async fn manifest_is_read_even_when_trusted() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let manifest = add(&store, br#"{"name":"a","version":"1.0.0"}"#, 0o644).await;
    let mut index = PackageFilesIndex::new(FilesMap::from([("package.json".to_owned(), manifest)]));

    let result = CheckOptions::new()
        .read_manifest(true)
        .check(&store, &mut index)
        .await
        .unwrap();
    assert!(result.passed);
    assert_eq!(result.manifest.unwrap().version.as_deref(), Some("1.0.0"));
    assert_eq!(store.verified_file_count(), 0);
}

#[test_log::test(tokio::test)]
async fn manifest_is_returned_when_other_files_fail() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let manifest = add(&store, br#"{"name":"a","version":"1.0.0"}"#, 0o644).await;
    let mut index = PackageFilesIndex::new(FilesMap::from([
        ("package.json".to_owned(), manifest),
        ("gone.js".to_owned(), absent(b"gone")),
    ]));

    let result = store.check_package_files(&mut index, true).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.manifest.unwrap().name.as_deref(), Some("a"));
}

#[test_log::test(tokio::test)]
async fn failing_side_effects_group_is_dropped() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let main = add(&store, b"main", 0o644).await;
    let built = add(&store, b"addon", 0o755).await;

    let mut index = PackageFilesIndex::new(FilesMap::from([("index.js".to_owned(), main)]));
    index.side_effects = Some(SideEffects::from([
        (
            "linux-x64".to_owned(),
            FilesMap::from([("build/addon.node".to_owned(), built)]),
        ),
        (
            "darwin-arm64".to_owned(),
            FilesMap::from([("build/addon.node".to_owned(), absent(b"never built"))]),
        ),
    ]));

    let result = store.check_package_files(&mut index, false).await.unwrap();
    assert!(result.passed);
    let groups: BTreeSet<_> = index.side_effects.unwrap().into_keys().collect();
    assert_eq!(groups, BTreeSet::from(["linux-x64".to_owned()]));
}

#[test_log::test(tokio::test)]
async fn corrupted_side_effects_group_is_dropped() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let main = add(&store, b"main", 0o644).await;
    let linux = FilesMap::from([
        ("build/addon.node".to_owned(), add(&store, b"linux addon", 0o755).await),
        ("build/config.gypi".to_owned(), add(&store, b"{}", 0o644).await),
    ]);
    let darwin_record = add(&store, b"darwin addon", 0o755).await;
    let darwin_path = content_path(&store, &darwin_record);

    std::fs::write(&darwin_path, b"DARWIN ADDON").unwrap();
    push_mtime(&darwin_path, darwin_record.checked_at.unwrap(), 60_000);

    let mut index = PackageFilesIndex::new(FilesMap::from([("index.js".to_owned(), main)]));
    index.side_effects = Some(SideEffects::from([
        ("linux-x64".to_owned(), linux.clone()),
        (
            "darwin-arm64".to_owned(),
            FilesMap::from([("build/addon.node".to_owned(), darwin_record)]),
        ),
    ]));

    let result = store.check_package_files(&mut index, false).await.unwrap();
    assert!(result.passed);
    assert_eq!(index.side_effects, Some(SideEffects::from([("linux-x64".to_owned(), linux)])));
    assert!(!darwin_path.exists());
}

#[test_log::test(tokio::test)]
async fn side_effects_untouched_when_files_fail() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());

    let mut index = PackageFilesIndex::new(FilesMap::from([("index.js".to_owned(), absent(b"x"))]));
    let broken = SideEffects::from([(
        "linux-x64".to_owned(),
        FilesMap::from([("a".to_owned(), absent(b"y"))]),
    )]);
    index.side_effects = Some(broken.clone());

    let result = store.check_package_files(&mut index, true).await.unwrap();
    assert!(!result.passed);
    assert!(result.manifest.is_none());
    assert_eq!(index.side_effects, Some(broken));
}

#[test_log::test(tokio::test)]
async fn cancelled_check() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let record = add(&store, b"a", 0o644).await;
    let mut index = PackageFilesIndex::new(FilesMap::from([("a".to_owned(), record)]));

    let token = CancellationToken::new();
    token.cancel();
    let err = CheckOptions::new()
        .cancel_token(token)
        .check(&store, &mut index)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Cancelled));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_writers_converge() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .write_buffer(Bytes::from_static(b"shared across packages"), 0o644)
                    .await
            })
        })
        .collect();

    let mut paths = BTreeSet::new();
    for task in tasks {
        paths.insert(task.await.unwrap().unwrap().path);
    }
    assert_eq!(paths.len(), 1);
    let path = paths.pop_first().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"shared across packages");
    assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
}

#[test_log::test(tokio::test)]
async fn index_round_trip_through_disk() {
    let dir = CanonicalTempDir::new().unwrap();
    let store = Store::new(dir.path());
    let mut index = PackageFilesIndex::new(FilesMap::from([
        ("package.json".to_owned(), add(&store, b"{}", 0o644).await),
        ("bin/run".to_owned(), add(&store, b"run", 0o755).await),
    ]));
    index.name = Some("a".into());
    index.version = Some("1.0.0".into());
    index.requires_build = Some(false);
    index.side_effects = Some(SideEffects::from([(
        "linux-x64".to_owned(),
        FilesMap::from([("out.node".to_owned(), add(&store, b"node", 0o644).await)]),
    )]));

    let path = store.index_file_path(&Algorithm::SHA512.digest(b"a-1.0.0.tgz"));
    store.write_index_file(&path, &index).await.unwrap();
    assert!(path.to_string_lossy().ends_with("-index.json"));

    let mut loaded = store.read_index_file(&path).await.unwrap().unwrap();
    assert_eq!(loaded, index);
    assert!(store.check_package_files(&mut loaded, false).await.unwrap().passed);
    assert_eq!(loaded, index);
}

#[test_log::test(tokio::test)]
async fn adds_directory() {
    let dir = CanonicalTempDir::new().unwrap();
    let package = dir.path().join("package");
    std::fs::create_dir_all(package.join("lib")).unwrap();
    std::fs::write(package.join("package.json"), br#"{"name":"local"}"#).unwrap();
    std::fs::write(package.join("lib").join("a.js"), b"a").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        let script = package.join("run.sh");
        std::fs::write(&script, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("lib/a.js", package.join("link.js")).unwrap();
    }

    let store = Store::new(dir.path().join("store"));
    let added = store.add_files_from_dir(&package, true).await.unwrap();

    assert_eq!(added.manifest.unwrap().name.as_deref(), Some("local"));
    assert!(added.files_index.contains_key("lib/a.js"));
    assert!(!added.files_index.contains_key("link.js"));
    for record in added.files_index.values() {
        assert!(content_path(&store, record).exists());
    }
    #[cfg(unix)]
    {
        let script = &added.files_index["run.sh"];
        assert_eq!(script.mode & 0o777, 0o755);
        assert!(content_path(&store, script).to_string_lossy().ends_with("-exec"));
    }
}
