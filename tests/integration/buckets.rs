use vfstore::types::ProjectConfig;
use vfstore::vfs::{CreateBucketOptions, CreateFileOptions};

use crate::support::{bound, storage_used};

#[tokio::test]
async fn empty_bucket_deletes_without_force() {
    let vfs = bound(ProjectConfig::default()).await;
    vfs.create_bucket("scratch", CreateBucketOptions::default())
        .await
        .unwrap();
    vfs.delete_bucket("scratch", false).await.unwrap();
    assert!(vfs.get_bucket("scratch").await.unwrap().is_none());
}

#[tokio::test]
async fn non_empty_bucket_needs_force() {
    let vfs = bound(ProjectConfig::default()).await;
    vfs.create_bucket("reports", CreateBucketOptions::default())
        .await
        .unwrap();
    for i in 0..3 {
        vfs.create_file(
            &format!("reports/q{}.csv", i),
            CreateFileOptions::with_content("a,b\n1,2\n"),
        )
        .await
        .unwrap();
    }

    let err = vfs.delete_bucket("reports", false).await.unwrap_err();
    assert_eq!(err.code(), "BUCKET_NOT_EMPTY");
    assert_eq!(vfs.get_bucket("reports").await.unwrap().unwrap().file_count, 3);

    vfs.delete_bucket("reports", true).await.unwrap();
    assert!(vfs.get_bucket("reports").await.unwrap().is_none());
    assert_eq!(vfs.get_stats().await.unwrap().total_files, 0);
    assert_eq!(storage_used(&vfs).await, 0);
}

#[tokio::test]
async fn bucket_policy_limits_uploads() {
    let vfs = bound(ProjectConfig::default()).await;
    vfs.create_bucket(
        "images",
        CreateBucketOptions {
            is_public: true,
            max_file_size: Some(10),
            allowed_mime_types: Some(vec!["image/*".to_string()]),
            ..CreateBucketOptions::default()
        },
    )
    .await
    .unwrap();

    let wrong_type = vfs
        .create_file("images/notes.txt", CreateFileOptions::with_content("hi"))
        .await
        .unwrap_err();
    assert_eq!(wrong_type.code(), "MIME_TYPE_NOT_ALLOWED");

    let too_big = vfs
        .create_file("images/big.png", CreateFileOptions::with_content(vec![0u8; 11]))
        .await
        .unwrap_err();
    assert_eq!(too_big.code(), "FILE_TOO_LARGE");

    vfs.create_file("images/ok.png", CreateFileOptions::with_content(vec![0u8; 10]))
        .await
        .unwrap();
}
