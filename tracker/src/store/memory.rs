use std::collections::HashMap;

use freight_types::{FreightId, FreightRecord, Revision, TrackingPatch};
use parking_lot::Mutex;

use super::{apply_conditional, FreightStore, WriteOutcome};
use crate::{ErrorKind, Result};

/// Record store that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<FreightId, FreightRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored freights
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl FreightStore for MemoryStore {
    fn get(&self, freight_id: &FreightId) -> Result<Option<FreightRecord>> {
        Ok(self.records.lock().get(freight_id).cloned())
    }

    fn create(&self, freight_id: &FreightId, record: &FreightRecord) -> Result<Revision> {
        let mut records = self.records.lock();
        if records.contains_key(freight_id) {
            return Err(ErrorKind::FreightExists {
                freight_id: freight_id.clone(),
            }
            .into());
        }
        records.insert(freight_id.clone(), record.clone());
        Ok(record.revision)
    }

    fn update(
        &self,
        freight_id: &FreightId,
        expected: Revision,
        patch: TrackingPatch,
    ) -> Result<WriteOutcome> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(freight_id)
            .ok_or_else(|| ErrorKind::FreightNotFound {
                freight_id: freight_id.clone(),
            })?;
        // apply works on a copy, so a rejected patch leaves the stored record untouched
        let mut updated = record.clone();
        let outcome = apply_conditional(freight_id, &mut updated, expected, patch)?;
        if let WriteOutcome::Committed(_) = outcome {
            *record = updated;
        }
        Ok(outcome)
    }
}
