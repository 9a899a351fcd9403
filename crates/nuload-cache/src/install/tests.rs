use super::*;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use tempfile::tempdir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use camino::Utf8PathBuf;
use nuload_core::utils::sha512_base64;
use nuload_core::{SourceOrigin, TargetFramework, Version};
use nuload_registry::{FeedPackage, LocalFeed, PackageSource};

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn nupkg(id: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml".to_string(), "<Types/>".to_string()),
        (format!("{}.nuspec", id), "<package/>".to_string()),
        (format!("lib/net5.0/{}.dll", id), format!("MZ {}", id)),
        (format!("lib/netstandard2.0/{}.dll", id), format!("MZ {} ns", id)),
    ] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn feed_with(packages: &[(&str, &str)]) -> LocalFeed {
    let mut feed = LocalFeed::new("feed");
    for (id, version) in packages {
        feed.add_with_artifact(FeedPackage::new(*id, v(version)), nupkg(id));
    }
    feed
}

/// Candidates as the resolver would hand them over
async fn resolved_from(feed: &LocalFeed, packages: &[(&str, &str)]) -> ResolvedSet {
    let mut selected = Vec::new();
    for (id, version) in packages {
        let identity = PackageIdentity::new(*id, v(version));
        let info = feed
            .dependency_info(&identity, &TargetFramework::default())
            .await
            .unwrap()
            .unwrap();
        selected.push(CandidatePackage {
            identity: info.identity,
            dependencies: info.dependencies,
            origin: feed.origin().clone(),
            content: info.content,
        });
    }
    ResolvedSet::new(selected)
}

fn installer(feed: LocalFeed, cache_root: &Path) -> Installer {
    let cache = PackageCache::new(Utf8PathBuf::from_path_buf(cache_root.to_path_buf()).unwrap()).unwrap();
    Installer::new(SourceSet::new(vec![Arc::new(feed)]), cache)
}

/// Relative path -> contents of every file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_materialize_layout() {
    let packages = [("Foo", "1.0.0"), ("Bar", "2.1.0")];
    let feed = feed_with(&packages);
    let resolved = resolved_from(&feed, &packages).await;

    let dir = tempdir().unwrap();
    let target = dir.path().join("packages");
    let installer = installer(feed, &dir.path().join("cache"));

    let installed = installer
        .materialize(&resolved, &target, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(installed.len(), 2);
    assert_eq!(installed[0].identity.id, "Foo");
    assert!(installed.iter().all(|p| p.status == InstallStatus::Extracted));
    assert!(installed.iter().all(|p| !p.from_cache));
    assert_eq!(installed[0].files, 3);

    assert_eq!(fs::read(target.join("Foo.1.0.0/lib/net5.0/Foo.dll")).unwrap(), b"MZ Foo");
    assert!(target.join("Bar.2.1.0/lib/netstandard2.0/Bar.dll").exists());
    assert!(!target.join("Foo.1.0.0/[Content_Types].xml").exists());

    // Nothing but package directories is left behind
    let mut names: Vec<String> = fs::read_dir(&target)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Bar.2.1.0", "Foo.1.0.0"]);
}

#[tokio::test]
async fn test_materialize_twice_is_idempotent() {
    let packages = [("Foo", "1.0.0"), ("Bar", "2.1.0"), ("Baz", "0.3.0")];
    let feed = feed_with(&packages);
    let resolved = resolved_from(&feed, &packages).await;

    let dir = tempdir().unwrap();
    let target = dir.path().join("packages");
    let installer = installer(feed, &dir.path().join("cache"));
    let cancel = CancellationToken::new();

    installer.materialize(&resolved, &target, &cancel).await.unwrap();
    let first = snapshot(&target);

    let second_run = installer.materialize(&resolved, &target, &cancel).await.unwrap();
    assert!(second_run
        .iter()
        .all(|p| p.status == InstallStatus::AlreadyPresent));
    assert_eq!(snapshot(&target), first);
}

#[tokio::test]
async fn test_cached_artifact_is_reused() {
    let packages = [("Foo", "1.0.0")];
    let feed = feed_with(&packages);
    let resolved = resolved_from(&feed, &packages).await;

    let dir = tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    let cancel = CancellationToken::new();

    installer(feed, &cache_root)
        .materialize(&resolved, &dir.path().join("first"), &cancel)
        .await
        .unwrap();

    // Same origin location, but the feed no longer serves the artifact
    let emptied = installer(LocalFeed::new("feed"), &cache_root);
    let installed = emptied
        .materialize(&resolved, &dir.path().join("second"), &cancel)
        .await
        .unwrap();

    assert!(installed[0].from_cache);
    assert_eq!(snapshot(&dir.path().join("first")), snapshot(&dir.path().join("second")));
}

#[tokio::test]
async fn test_corrupted_cache_entry_is_downloaded_again() {
    let packages = [("Foo", "1.0.0")];
    let feed = feed_with(&packages);
    let resolved = resolved_from(&feed, &packages).await;

    let dir = tempdir().unwrap();
    let installer = installer(feed, &dir.path().join("cache"));
    let cancel = CancellationToken::new();

    installer
        .materialize(&resolved, &dir.path().join("first"), &cancel)
        .await
        .unwrap();

    let identity = PackageIdentity::new("Foo", v("1.0.0"));
    let artifact = installer.cache().artifact_path(&identity, "memory://feed");
    fs::write(&artifact, b"garbage").unwrap();

    let installed = installer
        .materialize(&resolved, &dir.path().join("second"), &cancel)
        .await
        .unwrap();
    assert!(!installed[0].from_cache);
    assert!(dir.path().join("second/Foo.1.0.0/lib/net5.0/Foo.dll").exists());
}

#[tokio::test]
async fn test_failure_aborts_without_partial_directory() {
    let mut feed = feed_with(&[("Good", "1.0.0")]);
    feed.add_with_artifact(FeedPackage::new("Broken", v("1.0.0")), b"not a zip".to_vec());
    let resolved = resolved_from(&feed, &[("Good", "1.0.0"), ("Broken", "1.0.0")]).await;

    let dir = tempdir().unwrap();
    let target = dir.path().join("packages");
    let err = installer(feed, &dir.path().join("cache"))
        .materialize(&resolved, &target, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        NuloadError::Acquisition { id, version, source, .. } => {
            assert_eq!(id, "Broken");
            assert_eq!(version, "1.0.0");
            assert!(matches!(*source, NuloadError::Archive { .. }));
        },
        other => panic!("expected Acquisition, got {:?}", other),
    }
    assert!(!target.join("Broken.1.0.0").exists());
}

#[tokio::test]
async fn test_hash_mismatch_is_rejected() {
    let mut feed = LocalFeed::new("feed");
    let mut package = FeedPackage::new("Foo", v("1.0.0"));
    package.sha512 = Some(sha512_base64(b"something else"));
    feed.add_with_artifact(package, nupkg("Foo"));
    let resolved = resolved_from(&feed, &[("Foo", "1.0.0")]).await;

    let dir = tempdir().unwrap();
    let installer = installer(feed, &dir.path().join("cache"));
    let err = installer
        .materialize(&resolved, &dir.path().join("packages"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        NuloadError::Acquisition { source, .. } => {
            assert!(matches!(*source, NuloadError::IntegrityFailure { .. }))
        },
        other => panic!("expected Acquisition, got {:?}", other),
    }
    assert!(installer.cache().entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_matching_hash_is_accepted() {
    let mut feed = LocalFeed::new("feed");
    let mut package = FeedPackage::new("Foo", v("1.0.0"));
    let bytes = nupkg("Foo");
    package.sha512 = Some(sha512_base64(&bytes));
    feed.add_with_artifact(package, bytes);
    let resolved = resolved_from(&feed, &[("Foo", "1.0.0")]).await;

    let dir = tempdir().unwrap();
    let installed = installer(feed, &dir.path().join("cache"))
        .materialize(&resolved, &dir.path().join("packages"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(installed[0].status, InstallStatus::Extracted);
}

#[tokio::test]
async fn test_missing_download_location() {
    let feed = LocalFeed::new("feed").with_package(FeedPackage::new("Meta", v("1.0.0")));
    let resolved = ResolvedSet::new(vec![CandidatePackage {
        identity: PackageIdentity::new("Meta", v("1.0.0")),
        dependencies: Vec::new(),
        origin: SourceOrigin::new("feed", "memory://feed"),
        content: None,
    }]);

    let dir = tempdir().unwrap();
    let err = installer(feed, &dir.path().join("cache"))
        .materialize(&resolved, &dir.path().join("packages"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NuloadError::Acquisition { .. }));
}

#[tokio::test]
async fn test_cancelled_materialize() {
    let packages = [("Foo", "1.0.0")];
    let feed = feed_with(&packages);
    let resolved = resolved_from(&feed, &packages).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let dir = tempdir().unwrap();
    let err = installer(feed, &dir.path().join("cache"))
        .materialize(&resolved, &dir.path().join("packages"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, NuloadError::Cancelled));
    assert!(!dir.path().join("packages/Foo.1.0.0").exists());
}

#[tokio::test]
async fn test_empty_set() {
    let dir = tempdir().unwrap();
    let installed = installer(LocalFeed::new("feed"), &dir.path().join("cache"))
        .with_concurrency(0)
        .materialize(&ResolvedSet::default(), &dir.path().join("packages"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(installed.is_empty());
}
