use std::path::Path;
use std::sync::Arc;

use vfstore::engine::FileStorageEngine;
use vfstore::mime::ExtensionMimeResolver;
use vfstore::store::SledStoreFactory;
use vfstore::types::ProjectConfig;
use vfstore::VfsManager;

pub fn manager_with(factory: SledStoreFactory, config: ProjectConfig) -> VfsManager {
    let engine = FileStorageEngine::new(Arc::new(factory), config);
    VfsManager::new(engine, Arc::new(ExtensionMimeResolver))
}

/// Manager bound to project `demo` on a throwaway store.
pub async fn bound(config: ProjectConfig) -> VfsManager {
    let vfs = manager_with(SledStoreFactory::temporary(), config);
    vfs.initialize("demo").await.unwrap();
    vfs
}

/// Manager bound to `project_id` on a store rooted at `root`.
pub async fn bound_at(root: &Path, project_id: &str, config: ProjectConfig) -> VfsManager {
    let vfs = manager_with(SledStoreFactory::new(root), config);
    vfs.initialize(project_id).await.unwrap();
    vfs
}

pub fn numbered(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub async fn storage_used(vfs: &VfsManager) -> u64 {
    vfs.engine().metadata().await.unwrap().storage_used
}
