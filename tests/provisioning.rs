//! Model provisioning tests through the public API.

use axum::routing::get;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use lt_lambda_adapter::assets::{ArchiveSource, AssetProvisioner, ProvisionOutcome};
use lt_lambda_adapter::backend::LoopbackServer;
use lt_lambda_adapter::config::AssetConfig;
use lt_lambda_adapter::http::InvocationEvent;
use lt_lambda_adapter::supervisor::Preparation;

mod common;

fn asset_config(root: &Path) -> AssetConfig {
    AssetConfig {
        mount_path: root.join("mnt/models"),
        local_dir: root.join("tmp/models"),
        bucket: Some("lt-models".to_string()),
        key: Some("bundles/argos.tar.gz".to_string()),
        ..AssetConfig::default()
    }
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if std::fs::symlink_metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }
    out
}

#[tokio::test]
async fn test_assets_are_in_place_before_backend_launch() {
    let root = tempfile::tempdir().unwrap();
    let config = asset_config(root.path());
    let archive = common::tar_gz(&[("en_fr/model.bin", b"weights")]);
    let source = common::FixtureArchiveSource::new(archive);
    let provisioner = Arc::new(AssetProvisioner::new(
        config.clone(),
        Some(source.clone() as Arc<dyn ArchiveSource>),
    ));

    // The backend reads its model through the conventional mount path.
    let model = config.mount_path.join("en_fr/model.bin");
    let app = Router::new().route(
        "/model",
        get(move || {
            let model = model.clone();
            async move { std::fs::read_to_string(model).unwrap_or_else(|_| "missing".to_string()) }
        }),
    );
    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::InProcessLauncher::new(app, Duration::ZERO);
    let adapter = common::loopback_adapter(
        server,
        launcher,
        common::fast_timeouts(),
        Some(provisioner as Arc<dyn Preparation>),
    );

    let event: InvocationEvent =
        serde_json::from_value(serde_json::json!({"rawPath": "/model"})).unwrap();
    let first = adapter.handle(&event).await.unwrap();
    let second = adapter.handle(&event).await.unwrap();

    assert_eq!(first.body, "weights");
    assert_eq!(second.body, "weights");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    adapter.shutdown();
}

#[tokio::test]
async fn test_populated_local_dir_is_reused_without_fetching() {
    let root = tempfile::tempdir().unwrap();
    let config = asset_config(root.path());
    let source = common::FixtureArchiveSource::new(common::tar_gz(&[("model.bin", b"weights")]));

    let first = AssetProvisioner::new(
        config.clone(),
        Some(source.clone() as Arc<dyn ArchiveSource>),
    );
    assert!(first.ensure_assets(&config.mount_path).await);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

    // A later provisioner (same instance, mount link removed) finds the
    // ephemeral copy and never touches the network.
    std::fs::remove_file(&config.mount_path).ok();
    let second = AssetProvisioner::new(
        config.clone(),
        Some(source.clone() as Arc<dyn ArchiveSource>),
    );
    let outcome = second.provision(&config.mount_path).await.unwrap();
    assert!(matches!(
        outcome,
        ProvisionOutcome::AlreadyExtracted | ProvisionOutcome::SharedMount
    ));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hostile_archive_stays_inside_target() {
    let root = tempfile::tempdir().unwrap();
    let config = asset_config(root.path());
    let archive = common::tar_gz(&[
        ("../../escape.txt", b"x"),
        ("../sibling.txt", b"x"),
        ("/absolute.txt", b"x"),
        ("good/model.bin", b"weights"),
    ]);
    let source = common::FixtureArchiveSource::new(archive);
    let provisioner = AssetProvisioner::new(config.clone(), Some(source as Arc<dyn ArchiveSource>));

    let outcome = provisioner.provision(&config.mount_path).await.unwrap();
    match outcome {
        ProvisionOutcome::Extracted { report, .. } => {
            assert_eq!(report.extracted, 1);
            assert_eq!(report.skipped, 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let local = config.local_dir.canonicalize().unwrap();
    for path in walk(root.path()) {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(
            !["escape.txt", "sibling.txt", "absolute.txt"].contains(&name.as_str()),
            "{} was written",
            path.display()
        );
        if name == "model.bin" {
            assert!(path.canonicalize().unwrap().starts_with(&local));
        }
    }
    assert_eq!(
        std::fs::read(config.local_dir.join("good/model.bin")).unwrap(),
        b"weights"
    );
}
