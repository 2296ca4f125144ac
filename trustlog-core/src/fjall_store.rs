//! [`Storage`] implementation wrapping a Fjall keyspace.
//!
//! Every bucket shares one keyspace, with the bucket path as key prefix. An
//! update stages its writes in memory and commits them as a single Fjall write
//! batch, so a failed closure leaves nothing behind and a crash never exposes
//! half a commit.

use std::cell::RefCell;
use std::path::Path;
use std::sync::RwLock;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use tracing::debug;

use crate::error::{Result, TrustlogError};
use crate::storage::{lock_err, not_found, record_key, Bucket, Staged, Storage, Transaction};

const RECORDS_KEYSPACE: &str = "records";

/// Durable store backed by Fjall.
pub struct FjallStorage {
    db: Database,
    /// `bucket ++ 0x00 ++ key` → value.
    records: Keyspace,
    /// Held for reading by views and for writing by updates, so a view never
    /// straddles a commit.
    gate: RwLock<()>,
}

impl FjallStorage {
    /// Open (or create) the database directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = Database::builder(path).open()?;
        let records = db.keyspace(RECORDS_KEYSPACE, KeyspaceCreateOptions::default)?;
        debug!("Opened store at {}", path.display());
        Ok(Self {
            db,
            records,
            gate: RwLock::new(()),
        })
    }

    fn commit(&self, staged: Staged) -> Result<()> {
        if staged.is_empty() {
            return Ok(());
        }

        let mut batch = self.db.batch();
        for (key, value) in staged {
            match value {
                Some(value) => batch.insert(&self.records, key, value),
                None => batch.remove(&self.records, key),
            }
        }
        batch.commit()?;
        Ok(())
    }
}

impl Storage for FjallStorage {
    fn view(&self, f: &mut dyn FnMut(&dyn Transaction) -> Result<()>) -> Result<()> {
        let _guard = self.gate.read().map_err(lock_err)?;
        let txn = FjallTransaction::new(&self.records, false);
        f(&txn)
    }

    fn update(&self, f: &mut dyn FnMut(&dyn Transaction) -> Result<()>) -> Result<()> {
        let _guard = self.gate.write().map_err(lock_err)?;

        let staged = {
            let txn = FjallTransaction::new(&self.records, true);
            f(&txn)?;
            txn.staged.into_inner()
        };

        self.commit(staged)
    }
}

struct FjallTransaction<'a> {
    records: &'a Keyspace,
    staged: RefCell<Staged>,
    writable: bool,
}

impl<'a> FjallTransaction<'a> {
    fn new(records: &'a Keyspace, writable: bool) -> Self {
        Self {
            records,
            staged: RefCell::new(Staged::new()),
            writable,
        }
    }
}

impl Transaction for FjallTransaction<'_> {
    fn get(&self, bucket: &Bucket, key: &[u8]) -> Result<Vec<u8>> {
        let composite = record_key(bucket, key);

        if let Some(staged) = self.staged.borrow().get(&composite) {
            return staged.clone().ok_or_else(|| not_found(bucket, key));
        }

        match self.records.get(&composite)? {
            Some(value) => Ok(value.to_vec()),
            None => Err(not_found(bucket, key)),
        }
    }

    fn set(&self, bucket: &Bucket, key: &[u8], value: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(TrustlogError::ReadOnlyTransaction);
        }
        self.staged
            .borrow_mut()
            .insert(record_key(bucket, key), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, bucket: &Bucket, key: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(TrustlogError::ReadOnlyTransaction);
        }
        self.staged.borrow_mut().insert(record_key(bucket, key), None);
        Ok(())
    }
}
