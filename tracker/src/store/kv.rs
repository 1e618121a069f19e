use freight_kv_store::{Db, RawRead, RawWrite, Tx};
use freight_types::{FreightId, FreightRecord, Revision, TrackingPatch};

use super::{apply_conditional, FreightStore, WriteOutcome};
use crate::{config::TrackerConfig, ErrorKind, Result};

/// Record store on top of a transactional key-value database
///
/// Records are postcard encoded and keyed by the freight id. The revision check and the
/// write happen inside the same read-write transaction, which the backend serializes
/// against all other writers.
pub struct KvFreightStore<D: Db> {
    db: D,
    records: D::Handle,
}

impl<D: Db> KvFreightStore<D> {
    /// Creates the store, creating the records sub-database if necessary
    pub fn new(db: D, config: &TrackerConfig) -> Result<Self> {
        let records = db.create_sub_db(&config.records_sub_db)?;
        log::debug!("using sub-db '{}' for freight records", config.records_sub_db);
        Ok(Self { db, records })
    }
}

impl<D: Db> FreightStore for KvFreightStore<D> {
    fn get(&self, freight_id: &FreightId) -> Result<Option<FreightRecord>> {
        let txn = self.db.begin_ro_txn()?;
        let record = match txn.read(&self.records, freight_id)? {
            Some(bytes) => Some(postcard::from_bytes(bytes)?),
            None => None,
        };
        txn.commit()?;
        Ok(record)
    }

    fn create(&self, freight_id: &FreightId, record: &FreightRecord) -> Result<Revision> {
        let mut txn = self.db.begin_rw_txn()?;
        let exists = txn.read(&self.records, freight_id)?.is_some();
        if exists {
            txn.abort();
            return Err(ErrorKind::FreightExists {
                freight_id: freight_id.clone(),
            }
            .into());
        }
        let bytes = postcard::to_allocvec(record)?;
        txn.write(&self.records, freight_id, &bytes)?;
        txn.commit()?;
        log::debug!("created record of freight {freight_id}");
        Ok(record.revision)
    }

    fn update(
        &self,
        freight_id: &FreightId,
        expected: Revision,
        patch: TrackingPatch,
    ) -> Result<WriteOutcome> {
        let mut txn = self.db.begin_rw_txn()?;
        let stored: Option<FreightRecord> = match txn.read(&self.records, freight_id)? {
            Some(bytes) => Some(postcard::from_bytes(bytes)?),
            None => None,
        };
        let Some(mut record) = stored else {
            txn.abort();
            return Err(ErrorKind::FreightNotFound {
                freight_id: freight_id.clone(),
            }
            .into());
        };

        let outcome = match apply_conditional(freight_id, &mut record, expected, patch) {
            Ok(outcome) => outcome,
            Err(e) => {
                txn.abort();
                return Err(e);
            }
        };
        match outcome {
            WriteOutcome::Committed(revision) => {
                let bytes = postcard::to_allocvec(&record)?;
                txn.write(&self.records, freight_id, &bytes)?;
                txn.commit()?;
                log::debug!("wrote freight {freight_id} at {revision}");
            }
            WriteOutcome::Conflict { .. } => txn.abort(),
        }
        Ok(outcome)
    }
}
