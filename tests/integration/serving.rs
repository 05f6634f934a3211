use std::sync::Arc;

use vfstore::config::ServingConfig;
use vfstore::serve::{ServeOutcome, ServeRequest, UploadOutcome, PLACEHOLDER_HTML};
use vfstore::types::ProjectConfig;
use vfstore::vfs::CreateFileOptions;
use vfstore::ServingFacade;

use crate::support::{bound, numbered};

async fn facade() -> ServingFacade {
    let vfs = bound(ProjectConfig::default()).await;
    ServingFacade::new(Arc::new(vfs), ServingConfig::default())
}

#[tokio::test]
async fn range_request_returns_partial_content() {
    let serving = facade().await;
    let content = numbered(1000);
    serving
        .vfs()
        .create_file("public/video.mp4", CreateFileOptions::with_content(content.clone()))
        .await
        .unwrap();

    let outcome = serving
        .serve_file("public", "video.mp4", Some("bytes=100-199"))
        .await
        .unwrap();
    assert_eq!(outcome.status(), 206);
    assert_eq!(outcome.body(), &content[100..200]);
    match outcome {
        ServeOutcome::Partial { content_range, .. } => {
            assert_eq!(content_range, "bytes 100-199/1000")
        }
        other => panic!("expected partial content, got {:?}", other),
    }
}

#[tokio::test]
async fn open_range_on_empty_file_is_not_satisfiable() {
    let serving = facade().await;
    serving
        .vfs()
        .create_file("public/empty.txt", CreateFileOptions::with_content(Vec::new()))
        .await
        .unwrap();

    let outcome = serving
        .serve_file("public", "empty.txt", Some("bytes=0-"))
        .await
        .unwrap();
    assert_eq!(outcome, ServeOutcome::RangeNotSatisfiable { size: 0 });
}

#[tokio::test]
async fn missing_file_and_malformed_range() {
    let serving = facade().await;
    serving
        .vfs()
        .create_file("public/a.css", CreateFileOptions::with_content("body{}"))
        .await
        .unwrap();

    let missing = serving.serve_file("public", "nope.css", None).await.unwrap();
    assert_eq!(missing.status(), 404);

    let full = serving
        .serve_file("public", "a.css", Some("bytes=oops"))
        .await
        .unwrap();
    assert_eq!(full.status(), 200);
    assert_eq!(full.body(), b"body{}");
    assert_eq!(
        full.headers().unwrap().cache_control,
        "public, max-age=300"
    );
}

#[tokio::test]
async fn matching_etag_is_not_modified() {
    let serving = facade().await;
    serving
        .vfs()
        .create_file("public/logo.png", CreateFileOptions::with_content(vec![7u8; 32]))
        .await
        .unwrap();

    let first = serving.serve_file("public", "logo.png", None).await.unwrap();
    let etag = first.headers().unwrap().etag.clone();
    let request = ServeRequest {
        if_none_match: Some(etag),
        ..ServeRequest::default()
    };
    let second = serving
        .serve_file_with("public", "logo.png", &request)
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
    assert!(second.body().is_empty());
}

#[tokio::test]
async fn upload_conflict_is_reported() {
    let serving = facade().await;
    let first = serving
        .ingest_upload("public", "notes.txt", b"one".to_vec(), None)
        .await
        .unwrap();
    assert!(matches!(first, UploadOutcome::Created(_)));

    let second = serving
        .ingest_upload("public", "notes.txt", b"two".to_vec(), None)
        .await
        .unwrap();
    assert_eq!(
        second,
        UploadOutcome::Conflict {
            path: "public/notes.txt".to_string()
        }
    );
}

#[tokio::test]
async fn spa_fallback_chain() {
    let serving = facade().await;

    let placeholder = serving.serve_spa_fallback("dashboard").await.unwrap();
    assert_eq!(placeholder.body(), PLACEHOLDER_HTML.as_bytes());
    assert_eq!(placeholder.headers().unwrap().cache_control, "no-cache");

    serving
        .vfs()
        .create_file("app/index.html", CreateFileOptions::with_content("<html></html>"))
        .await
        .unwrap();
    serving
        .vfs()
        .create_file("app/main.js", CreateFileOptions::with_content("run()"))
        .await
        .unwrap();

    let asset = serving.serve_spa_fallback("main.js").await.unwrap();
    assert_eq!(asset.body(), b"run()");

    let route = serving.serve_spa_fallback("settings/profile").await.unwrap();
    assert_eq!(route.body(), b"<html></html>");
    assert_eq!(route.headers().unwrap().cache_control, "no-cache");
}

#[tokio::test]
async fn bucket_listing_is_relative() {
    let serving = facade().await;
    for path in ["public/a.txt", "public/img/b.png", "public/img/c.png"] {
        serving
            .vfs()
            .create_file(path, CreateFileOptions::with_content("x"))
            .await
            .unwrap();
    }

    let listing = serving
        .list_directory("public", "img", None, 0)
        .await
        .unwrap();
    let paths: Vec<&str> = listing.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["img/b.png", "img/c.png"]);
}
