use tempfile::TempDir;
use vfstore::types::ProjectConfig;
use vfstore::vfs::{CreateBucketOptions, CreateFileOptions, ProjectState};

use crate::support::{bound_at, numbered};

fn chunky() -> ProjectConfig {
    ProjectConfig {
        chunk_threshold: 128,
        chunk_size: 32,
        ..ProjectConfig::default()
    }
}

#[tokio::test]
async fn files_and_buckets_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let content = numbered(500);
    {
        let vfs = bound_at(dir.path(), "site", chunky()).await;
        vfs.create_file("public/blob.bin", CreateFileOptions::with_content(content.clone()))
            .await
            .unwrap();
        vfs.create_bucket("archive", CreateBucketOptions::default())
            .await
            .unwrap();
        vfs.engine().store().unwrap().flush().await.unwrap();
    }

    let vfs = bound_at(dir.path(), "site", chunky()).await;
    assert_eq!(vfs.read_file_content("public/blob.bin").await.unwrap(), content);
    assert!(vfs.get_bucket("archive").await.unwrap().is_some());
    assert_eq!(vfs.engine().metadata().await.unwrap().storage_used, 500);
}

#[tokio::test]
async fn projects_are_isolated() {
    let dir = TempDir::new().unwrap();
    let vfs = bound_at(dir.path(), "alpha", ProjectConfig::default()).await;
    vfs.create_file("public/only-alpha.txt", CreateFileOptions::with_content("a"))
        .await
        .unwrap();

    vfs.switch_to_project("beta").await.unwrap();
    assert_eq!(
        vfs.state(),
        ProjectState::Bound {
            project_id: "beta".to_string()
        }
    );
    assert!(vfs.read_file("public/only-alpha.txt").await.unwrap().is_none());
    assert_eq!(vfs.get_stats().await.unwrap().total_files, 0);

    vfs.switch_to_project("alpha").await.unwrap();
    assert_eq!(
        vfs.read_file_content("public/only-alpha.txt").await.unwrap(),
        b"a"
    );
}

#[tokio::test]
async fn failed_switch_keeps_previous_project() {
    let dir = TempDir::new().unwrap();
    let vfs = bound_at(dir.path(), "alpha", ProjectConfig::default()).await;

    let err = vfs.switch_to_project("../escape").await.unwrap_err();
    assert_eq!(err.code(), "INVALID_NAME");
    assert_eq!(vfs.current_project().as_deref(), Some("alpha"));
}

#[tokio::test]
async fn repair_restores_drifted_counter() {
    let dir = TempDir::new().unwrap();
    let vfs = bound_at(dir.path(), "site", ProjectConfig::default()).await;
    vfs.create_file("public/a.txt", CreateFileOptions::with_content("12345"))
        .await
        .unwrap();

    let mut metadata = vfs.engine().metadata().await.unwrap();
    metadata.storage_used = 999;
    metadata.file_count = 7;
    vfs.engine()
        .store()
        .unwrap()
        .put_metadata(metadata)
        .await
        .unwrap();

    let repaired = vfs.engine().recompute_usage().await.unwrap();
    assert_eq!(repaired.storage_used, 5);
    assert_eq!(repaired.file_count, 1);
}
