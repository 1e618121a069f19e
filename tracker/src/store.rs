//! Freight record store
//!
//! The tracker never writes a record blindly. Every write names the [`Revision`] it was
//! computed from, and the store only applies it if the record is still at that revision.

use freight_types::{FreightId, FreightRecord, Revision, TrackingPatch};

use crate::Result;

pub mod kv;
pub mod memory;

pub use kv::KvFreightStore;
pub use memory::MemoryStore;

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The patch was applied; the record is now at the given revision
    Committed(Revision),
    /// Somebody else wrote first; nothing was applied
    Conflict { current: Revision },
}

/// Persistent storage of freight records
pub trait FreightStore: Send + Sync {
    /// Returns the record of a freight, if it exists
    fn get(&self, freight_id: &FreightId) -> Result<Option<FreightRecord>>;

    /// Stores the record of a new freight.
    ///
    /// Fails with `FreightExists` if there already is a record for this id.
    fn create(&self, freight_id: &FreightId, record: &FreightRecord) -> Result<Revision>;

    /// Applies `patch` if the stored record is still at revision `expected`.
    ///
    /// Fails with `FreightNotFound` for unknown freights and rejects patches that
    /// would rewrite the stored history.
    fn update(
        &self,
        freight_id: &FreightId,
        expected: Revision,
        patch: TrackingPatch,
    ) -> Result<WriteOutcome>;
}

impl<T: FreightStore + ?Sized> FreightStore for std::sync::Arc<T> {
    fn get(&self, freight_id: &FreightId) -> Result<Option<FreightRecord>> {
        (**self).get(freight_id)
    }

    fn create(&self, freight_id: &FreightId, record: &FreightRecord) -> Result<Revision> {
        (**self).create(freight_id, record)
    }

    fn update(
        &self,
        freight_id: &FreightId,
        expected: Revision,
        patch: TrackingPatch,
    ) -> Result<WriteOutcome> {
        (**self).update(freight_id, expected, patch)
    }
}

/// Compare-and-swap on an in-flight record, shared by the store implementations
pub(crate) fn apply_conditional(
    freight_id: &FreightId,
    record: &mut FreightRecord,
    expected: Revision,
    patch: TrackingPatch,
) -> Result<WriteOutcome> {
    if record.revision != expected {
        log::debug!(
            "stale write on freight {freight_id}: expected {expected}, record is at {}",
            record.revision
        );
        return Ok(WriteOutcome::Conflict {
            current: record.revision,
        });
    }
    match record.apply(patch) {
        Ok(revision) => Ok(WriteOutcome::Committed(revision)),
        Err(e) => {
            log::warn!("rejected update of freight {freight_id}: {e}");
            Err(e.into())
        }
    }
}
