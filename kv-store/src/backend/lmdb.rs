use crate::{Db, Error, KvDatabase, KvHandle, RawRead, RawWrite, RoTx, RwTx, Tx};
use lmdb::{EnvironmentFlags, Transaction};
use std::{path::Path, sync::Arc};

impl From<lmdb::Error> for Error {
    fn from(value: lmdb::Error) -> Error {
        match value {
            lmdb::Error::KeyExist => Error::KeyExist,
            lmdb::Error::Corrupted | lmdb::Error::PageNotFound => Error::Corrupted,
            lmdb::Error::Invalid | lmdb::Error::BadValSize | lmdb::Error::BadDbi => {
                Error::InvalidArgument
            }
            lmdb::Error::MapFull => Error::MapFull,
            lmdb::Error::DbsFull
            | lmdb::Error::ReadersFull
            | lmdb::Error::TxnFull
            | lmdb::Error::PageFull => Error::Busy(value.to_string()),
            other => Error::Other(other.to_string()),
        }
    }
}

impl KvDatabase for lmdb::Database {}

#[derive(Debug, Clone, Copy)]
pub struct LmdbHandle {
    db: lmdb::Database,
}

impl KvHandle<lmdb::Database> for LmdbHandle {
    fn db(&self) -> &lmdb::Database {
        &self.db
    }
}

/// Shared LMDB environment
#[derive(Clone)]
pub struct Lmdb {
    env: Arc<lmdb::Environment>,
}

impl Lmdb {
    /// Opens (or creates) the environment in the directory `path`.
    ///
    /// `map_size` caps the size of the data file.
    pub fn with_map_size(path: &Path, max_dbs: u32, map_size: usize) -> Result<Lmdb, Error> {
        // a crash may lose the last commit, but never leaves a torn record behind
        let flags = EnvironmentFlags::NO_META_SYNC;
        let env = lmdb::Environment::new()
            .set_flags(flags)
            .set_max_dbs(max_dbs)
            .set_map_size(map_size)
            .open(path)?;
        log::debug!(
            "opened lmdb at {} (max_dbs={max_dbs}, map_size={map_size})",
            path.display()
        );
        Ok(Lmdb { env: Arc::new(env) })
    }
}

impl Db for Lmdb {
    type DB = lmdb::Database;
    type Handle = LmdbHandle;
    type RoTx<'env> = lmdb::RoTransaction<'env>;
    type RwTx<'env> = lmdb::RwTransaction<'env>;

    fn create_sub_db(&self, name: &str) -> Result<Self::Handle, Error> {
        let db = self
            .env
            .create_db(Some(name), lmdb::DatabaseFlags::empty())?;
        Ok(LmdbHandle { db })
    }

    fn begin_ro_txn(&self) -> Result<Self::RoTx<'_>, Error> {
        Ok(self.env.begin_ro_txn()?)
    }

    fn begin_rw_txn(&self) -> Result<Self::RwTx<'_>, Error> {
        Ok(self.env.begin_rw_txn()?)
    }
}

fn get<'txn>(
    txn: &'txn impl Transaction,
    db: &impl KvHandle<lmdb::Database>,
    key: &impl AsRef<[u8]>,
) -> Result<Option<&'txn [u8]>, Error> {
    match txn.get(*db.db(), key) {
        Ok(value) => Ok(Some(value)),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Tx for lmdb::RoTransaction<'_> {
    fn commit(self) -> Result<(), Error> {
        Ok(Transaction::commit(self)?)
    }

    fn abort(self) {
        Transaction::abort(self)
    }
}

impl<'env> RawRead<'env, lmdb::Database> for lmdb::RoTransaction<'env> {
    fn read(
        &self,
        db: &impl KvHandle<lmdb::Database>,
        key: &impl AsRef<[u8]>,
    ) -> Result<Option<&[u8]>, Error> {
        get(self, db, key)
    }
}

impl<'env> RoTx<'env, lmdb::Database> for lmdb::RoTransaction<'env> {}

impl Tx for lmdb::RwTransaction<'_> {
    fn commit(self) -> Result<(), Error> {
        Ok(Transaction::commit(self)?)
    }

    fn abort(self) {
        Transaction::abort(self)
    }
}

impl<'env> RawRead<'env, lmdb::Database> for lmdb::RwTransaction<'env> {
    fn read(
        &self,
        db: &impl KvHandle<lmdb::Database>,
        key: &impl AsRef<[u8]>,
    ) -> Result<Option<&[u8]>, Error> {
        get(self, db, key)
    }
}

impl<'env> RawWrite<'env, lmdb::Database> for lmdb::RwTransaction<'env> {
    fn write(
        &mut self,
        db: &impl KvHandle<lmdb::Database>,
        key: &impl AsRef<[u8]>,
        data: &impl AsRef<[u8]>,
    ) -> Result<(), Error> {
        self.put(*db.db(), key, data, lmdb::WriteFlags::empty())?;
        Ok(())
    }
}

impl<'env> RwTx<'env, lmdb::Database> for lmdb::RwTransaction<'env> {}
