//! Transactional byte store abstraction.
//!
//! All persistent state lives behind [`Storage`], which runs closures inside
//! read-only ([`Storage::view`]) or read-write ([`Storage::update`])
//! transactions. An update commits all of its writes atomically when the
//! closure returns `Ok`, and none of them otherwise.
//!
//! Keys are grouped in hierarchical [`Bucket`]s whose path segments are joined
//! with `/`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{Result, TrustlogError};

/// A hierarchical key namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bucket {
    path: Vec<String>,
}

impl Bucket {
    /// Create a top-level bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            path: vec![name.into()],
        }
    }

    /// Descend into a child bucket.
    pub fn cd(&self, name: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(name.into());
        Self { path }
    }

    /// Slash-joined bucket path.
    pub fn join(&self) -> String {
        self.path.join("/")
    }

    /// Scope a transaction to this bucket.
    pub fn txn<'t>(&self, txn: &'t dyn Transaction) -> BucketTransaction<'t> {
        BucketTransaction::new(self.clone(), txn)
    }
}

/// Operations available inside a storage transaction.
///
/// Methods take `&self` so several bucket views can share one transaction.
pub trait Transaction {
    /// Read a value. Returns [`TrustlogError::ObjectNotFound`] if absent.
    fn get(&self, bucket: &Bucket, key: &[u8]) -> Result<Vec<u8>>;

    /// Write a value.
    fn set(&self, bucket: &Bucket, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn delete(&self, bucket: &Bucket, key: &[u8]) -> Result<()>;
}

/// A transactional byte store.
pub trait Storage: Send + Sync {
    /// Run `f` inside a read-only transaction.
    fn view(&self, f: &mut dyn FnMut(&dyn Transaction) -> Result<()>) -> Result<()>;

    /// Run `f` inside a read-write transaction, committing iff it returns `Ok`.
    fn update(&self, f: &mut dyn FnMut(&dyn Transaction) -> Result<()>) -> Result<()>;
}

/// Value-returning helpers over any [`Storage`].
pub trait StorageExt: Storage {
    /// Run `f` in a read-only transaction and return its result.
    fn read<T>(&self, f: impl FnOnce(&dyn Transaction) -> Result<T>) -> Result<T> {
        let mut f = Some(f);
        let mut out = None;
        self.view(&mut |txn: &dyn Transaction| {
            let f = f
                .take()
                .ok_or_else(|| TrustlogError::Storage("transaction closure re-entered".into()))?;
            out = Some(f(txn)?);
            Ok(())
        })?;
        out.ok_or_else(|| TrustlogError::Storage("transaction produced no result".into()))
    }

    /// Run `f` in a read-write transaction and return its result.
    fn write<T>(&self, f: impl FnOnce(&dyn Transaction) -> Result<T>) -> Result<T> {
        let mut f = Some(f);
        let mut out = None;
        self.update(&mut |txn: &dyn Transaction| {
            let f = f
                .take()
                .ok_or_else(|| TrustlogError::Storage("transaction closure re-entered".into()))?;
            out = Some(f(txn)?);
            Ok(())
        })?;
        out.ok_or_else(|| TrustlogError::Storage("transaction produced no result".into()))
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// A transaction scoped to a single bucket.
#[derive(Clone)]
pub struct BucketTransaction<'t> {
    bucket: Bucket,
    txn: &'t dyn Transaction,
}

impl<'t> BucketTransaction<'t> {
    /// Scope `txn` to `bucket`.
    pub fn new(bucket: Bucket, txn: &'t dyn Transaction) -> Self {
        Self { bucket, txn }
    }

    /// The bucket this transaction is scoped to.
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Read a value from this bucket.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.txn.get(&self.bucket, key)
    }

    /// Read a value, mapping "not found" to `None`.
    pub fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.txn.get(&self.bucket, key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a value into this bucket.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.txn.set(&self.bucket, key, value)
    }

    /// Remove a value from this bucket.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.txn.delete(&self.bucket, key)
    }
}

type Records = BTreeMap<Vec<u8>, Vec<u8>>;

/// Writes staged by an update transaction; `None` marks a delete.
pub(crate) type Staged = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Key under which `key` of `bucket` is stored in a flat keyspace. The NUL
/// separator keeps `a`+`b/k` apart from `a/b`+`k`.
pub(crate) fn record_key(bucket: &Bucket, key: &[u8]) -> Vec<u8> {
    let mut composite = bucket.join().into_bytes();
    composite.push(0);
    composite.extend_from_slice(key);
    composite
}

pub(crate) fn lock_err(e: impl std::fmt::Display) -> TrustlogError {
    TrustlogError::Storage(format!("lock poisoned: {}", e))
}

pub(crate) fn not_found(bucket: &Bucket, key: &[u8]) -> TrustlogError {
    TrustlogError::ObjectNotFound {
        bucket: bucket.join(),
        key: hex::encode(key),
    }
}

/// Purely in-memory [`Storage`].
///
/// Readers share a read lock and writers hold the write lock for the whole
/// transaction, so a reader never observes a partial update. Writes are staged
/// in a per-transaction overlay and applied only on commit.
///
/// For a store that survives restarts use [`FjallStorage`](crate::FjallStorage).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<Records>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(lock_err)?.len())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Storage for MemoryStorage {
    fn view(&self, f: &mut dyn FnMut(&dyn Transaction) -> Result<()>) -> Result<()> {
        let guard = self.records.read().map_err(lock_err)?;
        let txn = MemoryTransaction::new(&guard, false);
        f(&txn)
    }

    fn update(&self, f: &mut dyn FnMut(&dyn Transaction) -> Result<()>) -> Result<()> {
        let mut guard = self.records.write().map_err(lock_err)?;

        let staged = {
            let txn = MemoryTransaction::new(&guard, true);
            f(&txn)?;
            txn.staged.into_inner()
        };

        for (key, value) in staged {
            match value {
                Some(value) => {
                    guard.insert(key, value);
                }
                None => {
                    guard.remove(&key);
                }
            }
        }
        Ok(())
    }
}

struct MemoryTransaction<'a> {
    base: &'a Records,
    staged: RefCell<Staged>,
    writable: bool,
}

impl<'a> MemoryTransaction<'a> {
    fn new(base: &'a Records, writable: bool) -> Self {
        Self {
            base,
            staged: RefCell::new(Staged::new()),
            writable,
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&self, bucket: &Bucket, key: &[u8]) -> Result<Vec<u8>> {
        let composite = record_key(bucket, key);

        let found = match self.staged.borrow().get(&composite) {
            Some(staged) => staged.clone(),
            None => self.base.get(&composite).cloned(),
        };

        found.ok_or_else(|| not_found(bucket, key))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_join() {
        let bucket = Bucket::new("log").cd("alpha").cd("vlog");
        assert_eq!(bucket.join(), "log/alpha/vlog");
    }

    #[test]
    fn test_update_commits_and_view_reads() {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("b");

        store
            .write(|txn| bucket.txn(txn).set(b"k", b"v"))
            .unwrap();

        let value = store.read(|txn| bucket.txn(txn).get(b"k")).unwrap();
        assert_eq!(value, b"v");
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("b");

        let result: Result<()> = store.write(|txn| {
            bucket.txn(txn).set(b"k", b"v")?;
            Err(TrustlogError::Storage("boom".into()))
        });
        assert!(result.is_err());

        let err = store.read(|txn| bucket.txn(txn).get(b"k")).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_view_is_read_only() {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("b");

        let err = store.read(|txn| bucket.txn(txn).set(b"k", b"v")).unwrap_err();
        assert!(matches!(err, TrustlogError::ReadOnlyTransaction));
    }

    #[test]
    fn test_transaction_sees_own_writes_and_deletes() {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("b");

        store.write(|txn| bucket.txn(txn).set(b"k", b"old")).unwrap();

        store
            .write(|txn| {
                let b = bucket.txn(txn);
                assert_eq!(b.get(b"k")?, b"old");
                b.set(b"k", b"new")?;
                assert_eq!(b.get(b"k")?, b"new");
                b.delete(b"k")?;
                assert_eq!(b.get_opt(b"k")?, None);
                Ok(())
            })
            .unwrap();

        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_len_counts_records() {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("b");

        store
            .write(|txn| {
                let b = bucket.txn(txn);
                b.set(b"k1", b"v")?;
                b.set(b"k2", b"v")
            })
            .unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_buckets_are_isolated() {
        let store = MemoryStorage::new();
        let a = Bucket::new("a");
        let b = Bucket::new("b");

        store.write(|txn| a.txn(txn).set(b"k", b"1")).unwrap();
        let missing = store.read(|txn| b.txn(txn).get_opt(b"k")).unwrap();
        assert!(missing.is_none());
    }
}
