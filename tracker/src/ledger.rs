//! Resolution ledger
//!
//! Tracks which stops of a freight have been delivered and which could not be delivered
//! (with the reason given by the driver). A stop is in at most one of the two sets.

use freight_types::Stop;

use crate::{stops::stop_identity, ErrorKind, Result};

/// Reference to an itinerary stop inside the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRef {
    /// Matching key
    pub city: String,
    pub state: String,
}

impl StopRef {
    /// Parses the "City/UF" form (an optional "prefix: " is ignored)
    pub fn parse(raw: &str) -> Self {
        let city = stop_identity(raw).to_string();
        let place = raw.split_once(':').map_or(raw, |(_, rest)| rest);
        let state = place
            .split_once('/')
            .map(|(_, state)| state.trim().to_string())
            .unwrap_or_default();
        StopRef { city, state }
    }

    pub fn label(&self) -> String {
        if self.state.is_empty() {
            self.city.clone()
        } else {
            format!("{}/{}", self.city, self.state)
        }
    }
}

impl From<&Stop> for StopRef {
    fn from(stop: &Stop) -> Self {
        StopRef {
            city: stop.city.clone(),
            state: stop.state.clone(),
        }
    }
}

/// A stop the driver marked as not delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStop {
    pub stop: StopRef,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    delivered: Vec<StopRef>,
    failed: Vec<FailedStop>,
}

impl Ledger {
    /// Delivered stops in confirmation order
    pub fn delivered(&self) -> &[StopRef] {
        &self.delivered
    }

    /// Failed stops in the order they were (last) marked
    pub fn failed(&self) -> &[FailedStop] {
        &self.failed
    }

    pub fn is_delivered(&self, identity: &str) -> bool {
        let city = stop_identity(identity);
        self.delivered.iter().any(|s| s.city == city)
    }

    pub fn is_failed(&self, identity: &str) -> bool {
        self.failure(identity).is_some()
    }

    pub fn is_resolved(&self, identity: &str) -> bool {
        self.is_delivered(identity) || self.is_failed(identity)
    }

    /// The failed entry for a stop, if any
    pub fn failure(&self, identity: &str) -> Option<&FailedStop> {
        let city = stop_identity(identity);
        self.failed.iter().find(|f| f.stop.city == city)
    }

    /// Marks a stop as delivered.
    ///
    /// A stop that was marked as failed before is moved over from the failed set.
    pub fn mark_delivered(&mut self, stop: StopRef) -> Result<()> {
        if self.is_delivered(&stop.city) {
            return Err(ErrorKind::AlreadyDelivered { stop: stop.label() }.into());
        }
        self.failed.retain(|f| f.stop.city != stop.city);
        self.delivered.push(stop);
        Ok(())
    }

    /// Marks a stop as not delivered.
    ///
    /// Re-marking a failed stop replaces its reason. Delivered stops cannot be failed.
    pub fn mark_failed(&mut self, stop: StopRef, reason: &str) -> Result<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ErrorKind::MissingReason.into());
        }
        if self.is_delivered(&stop.city) {
            return Err(ErrorKind::AlreadyDelivered { stop: stop.label() }.into());
        }
        self.failed.retain(|f| f.stop.city != stop.city);
        self.failed.push(FailedStop {
            stop,
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// The lowest-index stop that is neither delivered nor failed
    pub fn next_actionable_stop<'a>(&self, itinerary: &'a [Stop]) -> Option<&'a Stop> {
        itinerary
            .iter()
            .filter(|stop| !self.is_resolved(&stop.city))
            .min_by_key(|stop| stop.index)
    }

    /// Encodes the ledger into the record-store representation:
    /// `"City/UF"` for delivered and `"reason: City/UF"` for failed stops.
    pub fn to_wire(&self) -> (Vec<String>, Vec<String>) {
        let delivered = self.delivered.iter().map(StopRef::label).collect();
        let failed = self
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.reason, f.stop.label()))
            .collect();
        (delivered, failed)
    }

    /// Decodes the record-store representation.
    ///
    /// The reason of a failed entry is everything before the last `:`. Entries that
    /// violate the set invariants (a city twice, or both delivered and failed) are
    /// dropped; delivered wins over failed.
    pub fn from_wire(delivered: &[String], failed: &[String]) -> Self {
        let mut ledger = Ledger::default();
        for raw in delivered {
            let stop = StopRef::parse(raw);
            if stop.city.is_empty() || ledger.is_delivered(&stop.city) {
                log::warn!("dropping invalid delivered entry '{raw}'");
                continue;
            }
            ledger.delivered.push(stop);
        }
        for raw in failed {
            let (reason, place) = match raw.rsplit_once(':') {
                Some((reason, place)) => (reason.trim(), place),
                None => ("", raw.as_str()),
            };
            let stop = StopRef::parse(place);
            if stop.city.is_empty() || ledger.is_delivered(&stop.city) {
                log::warn!("dropping invalid failed entry '{raw}'");
                continue;
            }
            ledger.failed.retain(|f| f.stop.city != stop.city);
            ledger.failed.push(FailedStop {
                stop,
                reason: reason.to_string(),
            });
        }
        ledger
    }
}
