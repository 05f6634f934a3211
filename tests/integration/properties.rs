use proptest::prelude::*;
use vfstore::types::ProjectConfig;
use vfstore::vfs::CreateFileOptions;
use vfstore::VfsManager;

use crate::support::{bound, storage_used};

const THRESHOLD: u64 = 48;

#[derive(Debug, Clone)]
enum Op {
    Create(u8, Vec<u8>),
    Update(u8, Vec<u8>),
    Delete(u8),
}

fn op() -> impl Strategy<Value = Op> {
    let content = prop::collection::vec(any::<u8>(), 0..160);
    prop_oneof![
        (0u8..6, content.clone()).prop_map(|(slot, c)| Op::Create(slot, c)),
        (0u8..6, content).prop_map(|(slot, c)| Op::Update(slot, c)),
        (0u8..6).prop_map(Op::Delete),
    ]
}

fn config() -> ProjectConfig {
    ProjectConfig {
        chunk_threshold: THRESHOLD,
        chunk_size: 16,
        ..ProjectConfig::default()
    }
}

fn path(slot: u8) -> String {
    format!("public/dir{}/file{}.bin", slot % 2, slot)
}

/// Apply ops, tolerating the expected conflicts, and return the last content
/// written to each slot.
async fn run(vfs: &VfsManager, ops: &[Op]) -> [Option<Vec<u8>>; 6] {
    let mut expected: [Option<Vec<u8>>; 6] = Default::default();
    for op in ops {
        match op {
            Op::Create(slot, content) => {
                let result = vfs
                    .create_file(&path(*slot), CreateFileOptions::with_content(content.clone()))
                    .await;
                match &expected[*slot as usize] {
                    Some(_) => assert_eq!(result.unwrap_err().code(), "FILE_ALREADY_EXISTS"),
                    None => {
                        result.unwrap();
                        expected[*slot as usize] = Some(content.clone());
                    }
                }
            }
            Op::Update(slot, content) => {
                let result = vfs.update_file(&path(*slot), content.clone()).await;
                match &expected[*slot as usize] {
                    Some(_) => {
                        result.unwrap();
                        expected[*slot as usize] = Some(content.clone());
                    }
                    None => assert_eq!(result.unwrap_err().code(), "FILE_NOT_FOUND"),
                }
            }
            Op::Delete(slot) => {
                let deleted = vfs.delete_file(&path(*slot)).await.unwrap();
                assert_eq!(deleted, expected[*slot as usize].take().is_some());
            }
        }
    }
    expected
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_usage_and_content_track_writes(ops in prop::collection::vec(op(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let vfs = bound(config()).await;
            let expected = run(&vfs, &ops).await;

            let files = vfs.list_files(Default::default()).await.unwrap();
            let listed: u64 = files.iter().map(|f| f.size).sum();
            assert_eq!(storage_used(&vfs).await, listed);

            for (slot, content) in expected.iter().enumerate() {
                let path = path(slot as u8);
                match content {
                    Some(content) => {
                        let file = vfs.read_file(&path).await.unwrap().unwrap();
                        assert_eq!(file.is_chunked(), content.len() as u64 > THRESHOLD);
                        assert_eq!(&vfs.read_file_content(&path).await.unwrap(), content);
                    }
                    None => assert!(vfs.read_file(&path).await.unwrap().is_none()),
                }
            }

            let report = vfs.engine().cleanup_orphaned_chunks().await.unwrap();
            assert_eq!(report.removed, 0);
        });
    }
}
