//! Shipment state machine
//!
//! ```text
//! waiting --start_loading--> loading --start_transit--> in_transit --(last stop)--> delivered
//!                                                          ^    |
//!                                                          +----+ (stop resolved, more to go)
//! ```
//!
//! Every transition validates first and only then touches the ledger, the status and the
//! journal, so a rejected operation leaves the shipment untouched. `delivered` is never
//! requested directly, it follows from the last unresolved stop being resolved.

use chrono::{DateTime, Utc};
use freight_types::{
    Actor, FreightId, FreightRecord, ShipmentStatus, Stop, TechnicalStatus, TrackingEvent,
    TrackingPatch,
};

use crate::{
    journal::{messages, Journal},
    ledger::{Ledger, StopRef},
    stops::stop_identity,
    ErrorKind, Result,
};

/// Resolution counts over the itinerary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shipment {
    freight_id: FreightId,
    status: ShipmentStatus,
    itinerary: Vec<Stop>,
    ledger: Ledger,
    journal: Journal,
}

impl Shipment {
    /// A freight that has just been contracted
    pub fn new(freight_id: FreightId, itinerary: Vec<Stop>) -> Self {
        Shipment {
            freight_id,
            status: ShipmentStatus::Waiting,
            itinerary,
            ledger: Ledger::default(),
            journal: Journal::default(),
        }
    }

    pub fn from_record(freight_id: FreightId, record: &FreightRecord) -> Self {
        Shipment {
            freight_id,
            status: record.status,
            itinerary: record.stops.clone(),
            ledger: Ledger::from_wire(&record.delivered, &record.failed),
            journal: Journal::from_events(record.history.clone()),
        }
    }

    pub fn to_patch(&self) -> TrackingPatch {
        let (delivered, failed) = self.ledger.to_wire();
        TrackingPatch {
            status: self.status,
            delivered,
            failed,
            history: self.journal.events().to_vec(),
        }
    }

    pub fn freight_id(&self) -> &FreightId {
        &self.freight_id
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn itinerary(&self) -> &[Stop] {
        &self.itinerary
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn history(&self) -> &Journal {
        &self.journal
    }

    pub fn next_actionable_stop(&self) -> Option<&Stop> {
        self.ledger.next_actionable_stop(&self.itinerary)
    }

    pub fn progress(&self) -> Progress {
        let total = self.itinerary.len();
        let delivered = self
            .itinerary
            .iter()
            .filter(|s| self.ledger.is_delivered(&s.city))
            .count();
        let failed = self
            .itinerary
            .iter()
            .filter(|s| self.ledger.is_failed(&s.city))
            .count();
        Progress {
            total,
            delivered,
            failed,
            pending: total - delivered - failed,
        }
    }

    /// waiting -> loading
    pub fn start_loading(&mut self, actor: &Actor, at: DateTime<Utc>) -> Result<()> {
        self.ensure_active()?;
        self.ensure_status(ShipmentStatus::Waiting, "start loading")?;
        self.status = ShipmentStatus::Loading;
        self.record(TechnicalStatus::Loading, messages::loading_started(), actor, at);
        Ok(())
    }

    /// loading -> in_transit
    ///
    /// Without itinerary detail the freight still goes in transit, but there is no stop
    /// that could ever complete it.
    pub fn start_transit(&mut self, actor: &Actor, at: DateTime<Utc>) -> Result<()> {
        self.ensure_active()?;
        self.ensure_status(ShipmentStatus::Loading, "start transit")?;
        self.status = ShipmentStatus::InTransit;
        let next = self.next_actionable_stop().map(Stop::label);
        if next.is_none() {
            log::warn!(
                "freight {} goes in transit without itinerary detail",
                self.freight_id
            );
        }
        self.record(
            TechnicalStatus::InTransit,
            messages::in_transit(next.as_deref()),
            actor,
            at,
        );
        Ok(())
    }

    /// Confirms the delivery at a stop.
    ///
    /// The stop must be the next actionable one, or a stop that was marked as failed before.
    pub fn confirm_delivered(
        &mut self,
        identity: &str,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.ensure_status(ShipmentStatus::InTransit, "confirm a delivery")?;
        let stop = self.resolution_target(identity)?;
        let label = stop.label();

        self.ledger.mark_delivered(stop)?;
        self.record(
            TechnicalStatus::InTransit,
            messages::delivered(&label),
            actor,
            at,
        );
        match self.next_actionable_stop().map(Stop::label) {
            Some(next) => self.record(
                TechnicalStatus::InTransit,
                messages::in_transit(Some(&next)),
                actor,
                at,
            ),
            None => self.finalize(actor, at),
        }
        Ok(())
    }

    /// Marks a stop as not delivered.
    ///
    /// A failed stop counts as resolved: failing the last open stop finalizes the freight.
    pub fn confirm_failed(
        &mut self,
        identity: &str,
        reason: &str,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_active()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ErrorKind::MissingReason.into());
        }
        self.ensure_status(ShipmentStatus::InTransit, "report a failed delivery")?;
        let stop = self.resolution_target(identity)?;
        let label = stop.label();

        self.ledger.mark_failed(stop, reason)?;
        let next = self.next_actionable_stop().map(Stop::label);
        self.record(
            TechnicalStatus::DeliveryNotCompleted,
            messages::not_delivered(&label, reason, next.as_deref()),
            actor,
            at,
        );
        if next.is_none() {
            self.finalize(actor, at);
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status.is_final() {
            return Err(ErrorKind::ShipmentAlreadyFinalized {
                freight_id: self.freight_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn ensure_status(&self, expected: ShipmentStatus, action: &'static str) -> Result<()> {
        if self.status != expected {
            return Err(ErrorKind::InvalidTransition {
                freight_id: self.freight_id.clone(),
                status: self.status,
                action,
            }
            .into());
        }
        Ok(())
    }

    /// Looks up the stop a confirmation refers to and checks that it may be resolved now.
    fn resolution_target(&self, identity: &str) -> Result<StopRef> {
        let city = stop_identity(identity);
        let stop = self
            .itinerary
            .iter()
            .find(|s| s.city == city)
            .ok_or_else(|| ErrorKind::UnknownStop {
                freight_id: self.freight_id.clone(),
                stop: identity.to_string(),
            })?;

        if self.ledger.is_delivered(city) {
            return Err(ErrorKind::AlreadyDelivered { stop: stop.label() }.into());
        }
        // correcting a failed stop is always allowed
        if self.ledger.is_failed(city) {
            return Ok(StopRef::from(stop));
        }
        match self.next_actionable_stop() {
            Some(next) if next.index == stop.index => Ok(StopRef::from(stop)),
            next => Err(ErrorKind::StaleState {
                stop: stop.label(),
                next: next.map(Stop::label).unwrap_or_else(|| "none".to_string()),
            }
            .into()),
        }
    }

    fn finalize(&mut self, actor: &Actor, at: DateTime<Utc>) {
        self.status = ShipmentStatus::Delivered;
        let progress = self.progress();
        log::info!(
            "freight {} finalized ({} delivered, {} failed)",
            self.freight_id,
            progress.delivered,
            progress.failed
        );
        self.record(
            TechnicalStatus::Delivered,
            messages::finalized(progress.delivered, progress.failed),
            actor,
            at,
        );
    }

    fn record(
        &mut self,
        status: TechnicalStatus,
        message: String,
        actor: &Actor,
        at: DateTime<Utc>,
    ) {
        log::debug!("freight {}: {message}", self.freight_id);
        self.journal
            .append(TrackingEvent::new(status, message, actor, at));
    }
}
