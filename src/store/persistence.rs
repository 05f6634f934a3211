//! Sled-backed store
//!
//! One sled database per project. Each collection is a tree; each secondary
//! index is a tree keyed by `<value> 0x00 <primary key>`. Every write, index
//! entries included, runs inside a multi-tree transaction.

use super::{
    validate_project_id, Collection, IndexFilter, IndexName, Record, Store, StoreFactory, WriteOp,
};
use crate::error::{StorageError, VfsError};
use crate::types::{BucketRecord, ChunkRecord, FileRecord, ProjectMetadata};
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Transactional, Tree};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const INDEX_SEPARATOR: u8 = 0;

fn encode(record: &Record, key: &str) -> Result<Vec<u8>, StorageError> {
    let collection = record.collection().name();
    let bytes = match record {
        Record::File(f) => bincode::serialize(f),
        Record::Chunk(c) => bincode::serialize(c),
        Record::Metadata(m) => bincode::serialize(m),
        Record::Bucket(b) => bincode::serialize(b),
    };
    bytes.map_err(|e| StorageError::serialization(collection, key, e))
}

fn decode(collection: Collection, key: &str, bytes: &[u8]) -> Result<Record, StorageError> {
    let record = match collection {
        Collection::Files => bincode::deserialize::<FileRecord>(bytes).map(Record::File),
        Collection::Chunks => bincode::deserialize::<ChunkRecord>(bytes).map(Record::Chunk),
        Collection::Metadata => {
            bincode::deserialize::<ProjectMetadata>(bytes).map(Record::Metadata)
        }
        Collection::Buckets => bincode::deserialize::<BucketRecord>(bytes).map(Record::Bucket),
    };
    record.map_err(|e| StorageError::serialization(collection.name(), key, e))
}

fn index_key(value: &str, primary: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + primary.len() + 1);
    key.extend_from_slice(value.as_bytes());
    key.push(INDEX_SEPARATOR);
    key.extend_from_slice(primary.as_bytes());
    key
}

fn index_prefix(value: &str) -> Vec<u8> {
    let mut prefix = value.as_bytes().to_vec();
    prefix.push(INDEX_SEPARATOR);
    prefix
}

/// Tree layout shared by every handle of one project.
struct Trees {
    /// Data trees first (in `Collection::ALL` order), then index trees.
    all: Vec<Tree>,
    /// (collection, index) -> position in `all`
    index_positions: HashMap<(Collection, IndexName), usize>,
}

impl Trees {
    fn open(db: &sled::Db) -> Result<Self, sled::Error> {
        let mut all = Vec::new();
        for collection in Collection::ALL {
            all.push(db.open_tree(collection.name())?);
        }
        let mut index_positions = HashMap::new();
        for collection in Collection::ALL {
            for index in collection.indexes() {
                let name = format!("idx:{}:{}", collection.name(), index.name());
                index_positions.insert((collection, *index), all.len());
                all.push(db.open_tree(name)?);
            }
        }
        Ok(Self {
            all,
            index_positions,
        })
    }

    fn data_position(collection: Collection) -> usize {
        match collection {
            Collection::Files => 0,
            Collection::Chunks => 1,
            Collection::Metadata => 2,
            Collection::Buckets => 3,
        }
    }

    fn data(&self, collection: Collection) -> &Tree {
        &self.all[Self::data_position(collection)]
    }

    fn index(&self, collection: Collection, index: IndexName) -> Option<&Tree> {
        self.index_positions
            .get(&(collection, index))
            .map(|pos| &self.all[*pos])
    }
}

struct SledInner {
    project_id: String,
    db: sled::Db,
    trees: Trees,
}

type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

impl SledInner {
    fn unindex(
        &self,
        views: &[TransactionalTree],
        key: &str,
        record: &Record,
    ) -> TxResult<()> {
        let collection = record.collection();
        for index in collection.indexes() {
            if let Some(value) = record.index_value(*index) {
                let pos = self.trees.index_positions[&(collection, *index)];
                views[pos].remove(index_key(&value, key))?;
            }
        }
        Ok(())
    }

    fn reindex(&self, views: &[TransactionalTree], key: &str, record: &Record) -> TxResult<()> {
        let collection = record.collection();
        for index in collection.indexes() {
            if let Some(value) = record.index_value(*index) {
                let pos = self.trees.index_positions[&(collection, *index)];
                views[pos].insert(index_key(&value, key), key.as_bytes())?;
            }
        }
        Ok(())
    }

    fn apply_op(
        &self,
        views: &[TransactionalTree],
        op: &WriteOp,
        encoded: Option<&[u8]>,
    ) -> TxResult<()> {
        match op {
            WriteOp::Put { key, record } => {
                let collection = record.collection();
                let data = &views[Trees::data_position(collection)];
                if let Some(old) = data.get(key.as_bytes())? {
                    let old = decode(collection, key, &old)
                        .map_err(ConflictableTransactionError::Abort)?;
                    self.unindex(views, key, &old)?;
                }
                let bytes = encoded.ok_or_else(|| {
                    ConflictableTransactionError::Abort(StorageError::serialization(
                        collection.name(),
                        key.as_str(),
                        "record was not encoded before the transaction",
                    ))
                })?;
                data.insert(key.as_bytes(), bytes)?;
                self.reindex(views, key, record)?;
            }
            WriteOp::Delete { collection, key } => {
                let data = &views[Trees::data_position(*collection)];
                if let Some(old) = data.remove(key.as_bytes())? {
                    let old = decode(*collection, key, &old)
                        .map_err(ConflictableTransactionError::Abort)?;
                    self.unindex(views, key, &old)?;
                }
            }
        }
        Ok(())
    }

    fn apply(&self, ops: &[WriteOp]) -> Result<(), StorageError> {
        // Encode outside the transaction closure, which sled may retry.
        let encoded = ops
            .iter()
            .map(|op| match op {
                WriteOp::Put { key, record } => encode(record, key).map(Some),
                WriteOp::Delete { .. } => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result = self.trees.all.as_slice().transaction(|views| {
            for (op, bytes) in ops.iter().zip(encoded.iter()) {
                self.apply_op(views, op, bytes.as_deref())?;
            }
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StorageError::Transaction(e.to_string())),
        }
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<Record>, StorageError> {
        let tree = self.trees.data(collection);
        match tree
            .get(key.as_bytes())
            .map_err(|e| StorageError::backend(collection.name(), key, e))?
        {
            Some(bytes) => decode(collection, key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn keys(
        &self,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        match filter {
            Some(filter) => {
                let tree = self.trees.index(collection, filter.index).ok_or_else(|| {
                    StorageError::Transaction(format!(
                        "collection {} has no index {}",
                        collection.name(),
                        filter.index.name()
                    ))
                })?;
                for entry in tree.scan_prefix(index_prefix(&filter.value)) {
                    let (_, primary) = entry
                        .map_err(|e| StorageError::backend(collection.name(), &filter.value, e))?;
                    keys.push(String::from_utf8_lossy(&primary).into_owned());
                }
            }
            None => {
                for entry in self.trees.data(collection).iter().keys() {
                    let key = entry.map_err(|e| StorageError::backend(collection.name(), "*", e))?;
                    keys.push(String::from_utf8_lossy(&key).into_owned());
                }
            }
        }
        Ok(keys)
    }

    fn list(
        &self,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<Record>, StorageError> {
        if filter.is_none() {
            let mut records = Vec::new();
            for entry in self.trees.data(collection).iter() {
                let (key, bytes) =
                    entry.map_err(|e| StorageError::backend(collection.name(), "*", e))?;
                let key = String::from_utf8_lossy(&key);
                records.push(decode(collection, &key, &bytes)?);
            }
            return Ok(records);
        }
        let mut records = Vec::new();
        for key in self.keys(collection, filter)? {
            // Index entries are written in the same transaction as the data,
            // so a dangling entry only appears if the record vanished between calls.
            if let Some(record) = self.get(collection, &key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn clear(&self, collection: Collection) -> Result<usize, StorageError> {
        let data = self.trees.data(collection);
        let count = data.len();
        data.clear()
            .map_err(|e| StorageError::backend(collection.name(), "*", e))?;
        for index in collection.indexes() {
            if let Some(tree) = self.trees.index(collection, *index) {
                tree.clear()
                    .map_err(|e| StorageError::backend(collection.name(), index.name(), e))?;
            }
        }
        Ok(count)
    }
}

/// Sled-backed `Store` for a single project
#[derive(Clone)]
pub struct SledStore {
    inner: Arc<SledInner>,
}

impl SledStore {
    /// Open (or create) the project database at `path`.
    pub fn new(project_id: &str, path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path).map_err(|e| StorageError::Unavailable {
            project_id: project_id.to_string(),
            reason: format!("Failed to open sled database at {}: {}", path.display(), e),
        })?;
        Self::from_db(project_id, db)
    }

    /// Open a throwaway in-memory-backed database; removed on drop.
    pub fn temporary(project_id: &str) -> Result<Self, StorageError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StorageError::Unavailable {
                project_id: project_id.to_string(),
                reason: format!("Failed to open temporary sled database: {}", e),
            })?;
        Self::from_db(project_id, db)
    }

    pub fn from_db(project_id: &str, db: sled::Db) -> Result<Self, StorageError> {
        let trees = Trees::open(&db).map_err(|e| StorageError::Unavailable {
            project_id: project_id.to_string(),
            reason: format!("Failed to open collections: {}", e),
        })?;
        Ok(Self {
            inner: Arc::new(SledInner {
                project_id: project_id.to_string(),
                db,
                trees,
            }),
        })
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&SledInner) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StorageError::TaskJoin(e.to_string()))?
    }
}

#[async_trait]
impl Store for SledStore {
    fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    async fn put(&self, key: &str, record: Record) -> Result<(), StorageError> {
        self.apply(vec![WriteOp::put(key, record)]).await
    }

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Record>, StorageError> {
        let key = key.to_string();
        self.blocking(move |inner| inner.get(collection, &key)).await
    }

    async fn delete(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Record>, StorageError> {
        let key = key.to_string();
        self.blocking(move |inner| {
            let existing = inner.get(collection, &key)?;
            if existing.is_some() {
                inner.apply(&[WriteOp::delete(collection, key.as_str())])?;
            }
            Ok(existing)
        })
        .await
    }

    async fn list(
        &self,
        collection: Collection,
        filter: Option<IndexFilter>,
    ) -> Result<Vec<Record>, StorageError> {
        self.blocking(move |inner| inner.list(collection, filter.as_ref()))
            .await
    }

    async fn list_keys(
        &self,
        collection: Collection,
        filter: Option<IndexFilter>,
    ) -> Result<Vec<String>, StorageError> {
        self.blocking(move |inner| inner.keys(collection, filter.as_ref()))
            .await
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
        if ops.is_empty() {
            return Ok(());
        }
        self.blocking(move |inner| inner.apply(&ops)).await
    }

    async fn clear(&self, collection: Collection) -> Result<usize, StorageError> {
        self.blocking(move |inner| inner.clear(collection)).await
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.blocking(|inner| {
            inner
                .db
                .flush()
                .map(|_| ())
                .map_err(|e| StorageError::backend("db", inner.project_id.as_str(), e))
        })
        .await
    }
}

/// Opens one `SledStore` per project under a root directory.
///
/// sled holds an exclusive lock on its files, so handles are cached and
/// reused for the lifetime of the factory.
pub struct SledStoreFactory {
    /// None opens temporary databases
    root: Option<PathBuf>,
    handles: Mutex<HashMap<String, Arc<SledStore>>>,
}

impl SledStoreFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn temporary() -> Self {
        Self {
            root: None,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn project_path(&self, project_id: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(project_id))
    }
}

#[async_trait]
impl StoreFactory for SledStoreFactory {
    async fn open(&self, project_id: &str) -> Result<Arc<dyn Store>, VfsError> {
        validate_project_id(project_id)?;

        // Held across the open so two callers never race on sled's file lock.
        let mut handles = self.handles.lock().await;
        if let Some(existing) = handles.get(project_id) {
            return Ok(existing.clone() as Arc<dyn Store>);
        }

        let id = project_id.to_string();
        let path = self.project_path(project_id);
        let store = tokio::task::spawn_blocking(move || match path {
            Some(path) => SledStore::new(&id, &path),
            None => SledStore::temporary(&id),
        })
        .await
        .map_err(|e| StorageError::TaskJoin(e.to_string()))??;

        let handle = Arc::new(store);
        handles.insert(project_id.to_string(), handle.clone());
        match self.root.as_ref() {
            Some(root) => info!(project_id, root = %root.display(), "Opened project store"),
            None => debug!(project_id, "Opened temporary project store"),
        }
        Ok(handle as Arc<dyn Store>)
    }
}
