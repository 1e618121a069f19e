use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use thiserror::Error;

use crate::{ShipmentStatus, Stop, TrackingEvent};

/// Version token of a freight record
///
/// Every successful write bumps the revision by one. Writers pass the revision they
/// have read; the store rejects the write if the record has moved on in the meantime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Revision of a freshly created record
    pub const INITIAL: Revision = Revision(1);

    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The tracking part of a freight, as persisted by the record store
///
/// `delivered` and `failed` use the historical string encoding:
/// `"City/UF"` for delivered stops and `"reason: City/UF"` for failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FreightRecord {
    pub revision: Revision,
    pub status: ShipmentStatus,
    /// Canonical stop list, fixed when the freight is registered
    pub stops: Vec<Stop>,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    pub history: Vec<TrackingEvent>,
}

/// Write-back of a tracking change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrackingPatch {
    pub status: ShipmentStatus,
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    /// Full history; must extend the stored history
    pub history: Vec<TrackingEvent>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch would rewrite history (stored {stored} events, patch carries {proposed})")]
    HistoryRewrite { stored: usize, proposed: usize },
}

impl FreightRecord {
    /// Creates the record of a freight that has just been contracted
    pub fn new(stops: Vec<Stop>) -> Self {
        FreightRecord {
            revision: Revision::INITIAL,
            status: ShipmentStatus::Waiting,
            stops,
            delivered: Vec::new(),
            failed: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Applies a patch and bumps the revision.
    ///
    /// The stored history is append-only: the patch must carry every stored event,
    /// unchanged and in the same order, followed by the new ones.
    /// Revision checking is the job of the store.
    pub fn apply(&mut self, patch: TrackingPatch) -> Result<Revision, PatchError> {
        let stored = self.history.len();
        if patch.history.len() < stored || patch.history[..stored] != self.history[..] {
            return Err(PatchError::HistoryRewrite {
                stored,
                proposed: patch.history.len(),
            });
        }
        self.status = patch.status;
        self.delivered = patch.delivered;
        self.failed = patch.failed;
        self.history = patch.history;
        self.revision = self.revision.next();
        Ok(self.revision)
    }
}

/// JSON schema of the freight record
pub fn record_schema() -> schemars::Schema {
    schemars::schema_for!(FreightRecord)
}
