//! Sled-based storage for batch records.
//!
//! A batch is written once, after every document reached a terminal state.
//! The record blob and its metadata land in one transaction, so a reader
//! never sees half a batch.

use crate::batch::BatchRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const BATCHES_TREE: &str = "batches";
const META_TREE: &str = "batch_meta";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("batch not found: {0}")]
    NotFound(String),
    #[error("transaction aborted for batch: {0}")]
    Aborted(String),
}

/// Bookkeeping kept next to each stored batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMeta {
    /// The caller-supplied storage key
    pub key: String,
    /// When the batch was persisted
    pub finished_at: DateTime<Utc>,
    /// Number of documents in the batch
    pub documents: usize,
}

/// Sled-based storage for batch records, keyed by caller-supplied key.
pub struct Storage {
    db: sled::Db,
    batches: sled::Tree,
    meta: sled::Tree,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let batches = db.open_tree(BATCHES_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        Ok(Self { db, batches, meta })
    }

    /// Store a whole batch under `key`, replacing any previous batch there.
    pub fn save_batch(&self, key: &str, record: &BatchRecord) -> Result<(), StorageError> {
        let value = serde_json::to_vec(record)?;
        let meta = serde_json::to_vec(&BatchMeta {
            key: key.to_string(),
            finished_at: Utc::now(),
            documents: record.entries.len(),
        })?;

        (&self.batches, &self.meta)
            .transaction(|(batches, metas)| {
                batches.insert(key.as_bytes(), value.as_slice())?;
                metas.insert(key.as_bytes(), meta.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(err) => StorageError::DbError(err),
                TransactionError::Abort(()) => StorageError::Aborted(key.to_string()),
            })?;

        self.db.flush()?;
        debug!(key, documents = record.entries.len(), "batch persisted");
        Ok(())
    }

    /// Retrieve a batch by key
    pub fn load_batch(&self, key: &str) -> Result<Option<BatchRecord>, StorageError> {
        match self.batches.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Like [`Storage::load_batch`] but missing keys are an error.
    pub fn require_batch(&self, key: &str) -> Result<BatchRecord, StorageError> {
        self.load_batch(key)?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Metadata of all stored batches, newest first
    pub fn list_batches(&self) -> Result<Vec<BatchMeta>, StorageError> {
        let mut results = Vec::new();
        for item in self.meta.iter() {
            let (_key, value) = item?;
            results.push(serde_json::from_slice::<BatchMeta>(&value)?);
        }
        results.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(results)
    }

    /// Delete a batch by key
    pub fn delete_batch(&self, key: &str) -> Result<bool, StorageError> {
        let existed = (&self.batches, &self.meta)
            .transaction(|(batches, metas)| {
                let existed = batches.remove(key.as_bytes())?.is_some();
                metas.remove(key.as_bytes())?;
                Ok::<bool, ConflictableTransactionError<()>>(existed)
            })
            .map_err(|e| match e {
                TransactionError::Storage(err) => StorageError::DbError(err),
                TransactionError::Abort(()) => StorageError::Aborted(key.to_string()),
            })?;
        self.db.flush()?;
        Ok(existed)
    }

    /// Get the number of stored batches
    pub fn count(&self) -> usize {
        self.batches.len()
    }
}
