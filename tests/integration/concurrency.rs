use std::sync::Arc;

use tempfile::TempDir;
use vfstore::types::ProjectConfig;
use vfstore::vfs::CreateFileOptions;
use vfstore::VfsManager;

use crate::support::{bound, bound_at, numbered, storage_used};

fn small_chunks() -> ProjectConfig {
    ProjectConfig {
        chunk_threshold: 32,
        chunk_size: 8,
        ..ProjectConfig::default()
    }
}

async fn listed_total(vfs: &VfsManager) -> u64 {
    vfs.list_files(Default::default())
        .await
        .unwrap()
        .iter()
        .map(|f| f.size)
        .sum()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_on_one_path_admit_one() {
    let vfs = Arc::new(bound(small_chunks()).await);

    for round in 0..20 {
        let path = format!("public/r{}.bin", round);
        let handles: Vec<_> = (0..2usize)
            .map(|i| {
                let vfs = Arc::clone(&vfs);
                let path = path.clone();
                tokio::spawn(async move {
                    let content = numbered(40 + i * 10);
                    vfs.create_file(&path, CreateFileOptions::with_content(content))
                        .await
                })
            })
            .collect();
        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert_eq!(e.code(), "FILE_ALREADY_EXISTS"),
            }
        }
        assert_eq!(created, 1, "round {}", round);
    }

    assert_eq!(storage_used(&vfs).await, listed_total(&vfs).await);
    let report = vfs.engine().cleanup_orphaned_chunks().await.unwrap();
    assert_eq!(report.removed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_never_exceed_quota() {
    let config = ProjectConfig {
        max_file_size: 10,
        max_storage: 10,
        ..ProjectConfig::default()
    };
    let vfs = Arc::new(bound(config).await);

    for round in 0..20 {
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let vfs = Arc::clone(&vfs);
                tokio::spawn(async move {
                    let path = format!("public/q{}-{}.bin", round, i);
                    vfs.create_file(&path, CreateFileOptions::with_content(vec![0u8; 8]))
                        .await
                })
            })
            .collect();
        let mut accepted = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(file) => accepted.push(file.path),
                Err(e) => assert_eq!(e.code(), "QUOTA_EXCEEDED"),
            }
        }
        assert_eq!(accepted.len(), 1, "round {}", round);
        assert!(storage_used(&vfs).await <= 10);
        vfs.delete_file(&accepted[0]).await.unwrap();
    }
    assert_eq!(storage_used(&vfs).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweep_during_writes_keeps_live_chunks() {
    let vfs = Arc::new(bound(small_chunks()).await);

    let sweeper = {
        let vfs = Arc::clone(&vfs);
        tokio::spawn(async move {
            let mut removed = 0;
            for _ in 0..50 {
                removed += vfs.engine().cleanup_orphaned_chunks().await.unwrap().removed;
                tokio::task::yield_now().await;
            }
            removed
        })
    };
    let writers: Vec<_> = (0..50usize)
        .map(|i| {
            let vfs = Arc::clone(&vfs);
            tokio::spawn(async move {
                let path = format!("public/w{}.bin", i);
                vfs.create_file(&path, CreateFileOptions::with_content(numbered(64 + i)))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }
    assert_eq!(sweeper.await.unwrap(), 0);

    for i in 0..50usize {
        let content = vfs
            .read_file_content(&format!("public/w{}.bin", i))
            .await
            .unwrap();
        assert_eq!(content, numbered(64 + i));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writes_racing_a_switch_land_in_their_own_project() {
    let dir = TempDir::new().unwrap();
    let vfs = Arc::new(bound_at(dir.path(), "alpha", ProjectConfig::default()).await);

    let writers: Vec<_> = (0..20)
        .map(|i| {
            let vfs = Arc::clone(&vfs);
            tokio::spawn(async move {
                let path = format!("public/s{}.txt", i);
                vfs.create_file(&path, CreateFileOptions::with_content("x"))
                    .await
            })
        })
        .collect();
    let switcher = {
        let vfs = Arc::clone(&vfs);
        tokio::spawn(async move { vfs.switch_to_project("beta").await })
    };

    let mut written = Vec::new();
    for writer in writers {
        match writer.await.unwrap() {
            Ok(file) => written.push(file),
            Err(e) => assert_eq!(e.code(), "SWITCH_IN_PROGRESS"),
        }
    }
    switcher.await.unwrap().unwrap();

    for project in ["alpha", "beta"] {
        vfs.switch_to_project(project).await.unwrap();
        let stored = vfs.list_files(Default::default()).await.unwrap();
        for file in &stored {
            assert_eq!(file.project_id, project);
        }
        let expected = written.iter().filter(|f| f.project_id == project).count();
        assert_eq!(stored.len(), expected, "project {}", project);
        assert_eq!(storage_used(&vfs).await, expected as u64);
    }
}
