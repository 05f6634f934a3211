use vfstore::types::ProjectConfig;
use vfstore::vfs::CreateFileOptions;

use crate::support::{bound, numbered, storage_used};

#[tokio::test]
async fn small_file_is_stored_inline() {
    let vfs = bound(ProjectConfig::default()).await;
    let file = vfs
        .create_file("public/readme.txt", CreateFileOptions::with_content("hello"))
        .await
        .unwrap();

    assert_eq!(file.size, 5);
    assert!(!file.is_chunked());
    assert_eq!(file.mime_type, "text/plain");
    assert_eq!(
        vfs.read_file_content("public/readme.txt").await.unwrap(),
        b"hello"
    );
}

#[tokio::test]
async fn large_file_is_split_into_chunks() {
    let vfs = bound(ProjectConfig::default()).await;
    let content = numbered(2 * 1024 * 1024);
    let file = vfs
        .create_file("public/big.bin", CreateFileOptions::with_content(content.clone()))
        .await
        .unwrap();

    assert!(file.is_chunked());
    assert_eq!(file.chunk_ids().len(), 32);
    assert_eq!(vfs.read_file_content("public/big.bin").await.unwrap(), content);
}

#[tokio::test]
async fn second_create_on_same_path_conflicts() {
    let vfs = bound(ProjectConfig::default()).await;
    vfs.create_file("a/b.txt", CreateFileOptions::with_content("first"))
        .await
        .unwrap();

    let err = vfs
        .create_file("a/b.txt", CreateFileOptions::with_content("second"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FILE_ALREADY_EXISTS");
    assert_eq!(vfs.read_file_content("a/b.txt").await.unwrap(), b"first");
}

#[tokio::test]
async fn chunk_threshold_boundary() {
    let config = ProjectConfig {
        chunk_threshold: 100,
        chunk_size: 30,
        ..ProjectConfig::default()
    };
    let vfs = bound(config).await;

    let at = vfs
        .create_file("public/at.bin", CreateFileOptions::with_content(numbered(100)))
        .await
        .unwrap();
    let over = vfs
        .create_file("public/over.bin", CreateFileOptions::with_content(numbered(101)))
        .await
        .unwrap();

    assert!(!at.is_chunked());
    assert!(over.is_chunked());
    assert_eq!(over.chunk_ids().len(), 4);
}

#[tokio::test]
async fn quota_is_enforced_at_exact_boundary() {
    let config = ProjectConfig {
        max_file_size: 1000,
        max_storage: 1000,
        ..ProjectConfig::default()
    };
    let vfs = bound(config).await;
    vfs.create_file("public/a.bin", CreateFileOptions::with_content(numbered(600)))
        .await
        .unwrap();
    vfs.create_file("public/b.bin", CreateFileOptions::with_content(numbered(400)))
        .await
        .unwrap();
    assert_eq!(storage_used(&vfs).await, 1000);

    let err = vfs
        .create_file("public/c.bin", CreateFileOptions::with_content(numbered(1)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "QUOTA_EXCEEDED");
    assert!(vfs.read_file("public/c.bin").await.unwrap().is_none());
}

#[tokio::test]
async fn update_switches_between_inline_and_chunked() {
    let config = ProjectConfig {
        chunk_threshold: 64,
        chunk_size: 16,
        ..ProjectConfig::default()
    };
    let vfs = bound(config).await;
    let created = vfs
        .create_file("public/doc.txt", CreateFileOptions::with_content("short"))
        .await
        .unwrap();

    let grown = vfs
        .update_file("public/doc.txt", numbered(200))
        .await
        .unwrap();
    assert_eq!(grown.id, created.id);
    assert!(grown.is_chunked());
    assert_eq!(storage_used(&vfs).await, 200);

    let shrunk = vfs
        .update_file("public/doc.txt", b"tiny".to_vec())
        .await
        .unwrap();
    assert!(!shrunk.is_chunked());
    assert_eq!(
        vfs.read_file_content("public/doc.txt").await.unwrap(),
        b"tiny"
    );

    let report = vfs.engine().cleanup_orphaned_chunks().await.unwrap();
    assert_eq!(report.removed, 0);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let vfs = bound(ProjectConfig::default()).await;
    vfs.create_file("public/x.txt", CreateFileOptions::with_content("x"))
        .await
        .unwrap();

    assert!(vfs.delete_file("public/x.txt").await.unwrap());
    assert!(!vfs.delete_file("public/x.txt").await.unwrap());
    assert_eq!(storage_used(&vfs).await, 0);
}

#[tokio::test]
async fn move_keeps_content_and_id() {
    let vfs = bound(ProjectConfig::default()).await;
    let original = vfs
        .create_file("public/old/name.txt", CreateFileOptions::with_content("data"))
        .await
        .unwrap();

    let moved = vfs
        .move_file("public/old/name.txt", "private/new.txt")
        .await
        .unwrap();
    assert_eq!(moved.id, original.id);
    assert_eq!(moved.directory, "private");
    assert!(vfs.read_file("public/old/name.txt").await.unwrap().is_none());
    assert_eq!(
        vfs.read_file_content("private/new.txt").await.unwrap(),
        b"data"
    );
}

#[tokio::test]
async fn directory_delete_requires_recursive() {
    let vfs = bound(ProjectConfig::default()).await;
    for name in ["a.txt", "nested/b.txt"] {
        vfs.create_file(
            &format!("public/docs/{}", name),
            CreateFileOptions::with_content(name),
        )
        .await
        .unwrap();
    }

    let err = vfs.delete_directory("public/docs", false).await.unwrap_err();
    assert_eq!(err.code(), "DIRECTORY_NOT_EMPTY");
    assert_eq!(vfs.delete_directory("public/docs", true).await.unwrap(), 2);
    assert_eq!(vfs.get_stats().await.unwrap().total_files, 0);
}
