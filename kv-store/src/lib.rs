//! Transactional key-value storage for freight records.
//!
//! The record store only needs a small surface: named sub-databases, point reads and
//! point writes, all inside transactions. Read-write transactions are serialized by the
//! backend, which is what makes a read-compare-write inside one of them atomic.

use thiserror::Error;

pub mod backend;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key already exists")]
    KeyExist,
    #[error("database is corrupted")]
    Corrupted,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("database map is full")]
    MapFull,
    #[error("storage resources exhausted - {0}")]
    Busy(String),
    #[error("storage error - {0}")]
    Other(String),
}

/// Marker for the backend's database (table) type
pub trait KvDatabase {}

/// Handle to a named sub-database.
///
/// Handles are obtained once and then shared between transactions and threads.
pub trait KvHandle<DB: KvDatabase>: Send + Sync {
    fn db(&self) -> &DB;
}

/// A transaction that ends either in `commit` or in `abort`.
pub trait Tx: Sized {
    /// Makes all writes of the transaction visible at once
    fn commit(self) -> Result<(), Error>;

    /// Drops all writes of the transaction
    fn abort(self);
}

pub trait RawRead<'env, DB: KvDatabase> {
    /// Value stored under `key`, or `None` if the key is absent.
    ///
    /// The slice borrows from the transaction and is only valid while it is alive.
    fn read(&self, db: &impl KvHandle<DB>, key: &impl AsRef<[u8]>) -> Result<Option<&[u8]>, Error>;
}

pub trait RawWrite<'env, DB: KvDatabase> {
    /// Stores `data` under `key`, replacing any previous value
    fn write(
        &mut self,
        db: &impl KvHandle<DB>,
        key: &impl AsRef<[u8]>,
        data: &impl AsRef<[u8]>,
    ) -> Result<(), Error>;
}

pub trait RoTx<'env, DB: KvDatabase>: Tx + RawRead<'env, DB> {}

/// Reads inside a read-write transaction see its own uncommitted writes.
pub trait RwTx<'env, DB: KvDatabase>: Tx + RawRead<'env, DB> + RawWrite<'env, DB> {}

/// A transactional key-value database
pub trait Db: Clone + Send + Sync {
    type DB: KvDatabase;
    type Handle: KvHandle<Self::DB>;

    type RoTx<'env>: RoTx<'env, Self::DB>
    where
        Self: 'env;

    type RwTx<'env>: RwTx<'env, Self::DB>
    where
        Self: 'env;

    /// Opens the sub-database `name`, creating it on first use
    fn create_sub_db(&self, name: &str) -> Result<Self::Handle, Error>;

    fn begin_ro_txn(&self) -> Result<Self::RoTx<'_>, Error>;

    /// Blocks while another read-write transaction is open
    fn begin_rw_txn(&self) -> Result<Self::RwTx<'_>, Error>;
}
