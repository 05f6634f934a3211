//! vfstore: project-scoped virtual file store
//!
//! Files live in per-project sled databases. Large files are split into
//! chunks, buckets carry upload policy, and the serving layer answers
//! conditional and ranged reads.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mime;
pub mod serve;
pub mod store;
pub mod tooling;
pub mod types;
pub mod vfs;

pub use config::{ConfigLoader, VfsConfig};
pub use engine::FileStorageEngine;
pub use error::{StorageError, VfsError, VfsResult};
pub use serve::ServingFacade;
pub use store::SledStoreFactory;
pub use vfs::VfsManager;
