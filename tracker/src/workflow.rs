//! Driver-facing confirmation dialog
//!
//! ```text
//! idle --prompt--> awaiting_confirmation(stop) --confirm--> (commit) --> idle
//!                          |
//!                       decline
//!                          v
//!                  awaiting_reason(stop) --submit_reason--> (commit) --> idle
//! ```
//!
//! The dialog holds no tracking state of its own. Whatever was prompted is re-validated
//! by the [`Tracker`] against the stored record when the answer is committed.

use freight_types::{Actor, FreightId, Stop};

use crate::{
    service::{Snapshot, Tracker},
    store::FreightStore,
    ErrorKind, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Idle,
    AwaitingConfirmation(Stop),
    AwaitingReason(Stop),
}

/// Confirmation dialog of one actor for one freight
pub struct Confirmation<'t, S: FreightStore> {
    tracker: &'t Tracker<S>,
    freight_id: FreightId,
    actor: Actor,
    step: Step,
}

impl<'t, S: FreightStore> Confirmation<'t, S> {
    pub fn new(tracker: &'t Tracker<S>, freight_id: FreightId, actor: Actor) -> Self {
        Confirmation {
            tracker,
            freight_id,
            actor,
            step: Step::Idle,
        }
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    /// Asks for the next actionable stop of a freshly loaded shipment.
    ///
    /// Returns `None` (and stays idle) if there is nothing left to confirm.
    pub fn prompt(&mut self) -> Result<Option<&Stop>> {
        self.step = match self.tracker.prompt_next_stop(&self.freight_id)? {
            Some(stop) => Step::AwaitingConfirmation(stop),
            None => Step::Idle,
        };
        match &self.step {
            Step::AwaitingConfirmation(stop) => Ok(Some(stop)),
            _ => Ok(None),
        }
    }

    /// "Yes, delivered"
    pub fn confirm(&mut self) -> Result<Snapshot> {
        let stop = match std::mem::replace(&mut self.step, Step::Idle) {
            Step::AwaitingConfirmation(stop) => stop,
            other => {
                self.step = other;
                return Err(ErrorKind::NoPendingConfirmation.into());
            }
        };
        self.tracker
            .confirm_delivered(&self.freight_id, &stop.label(), &self.actor)
    }

    /// "No, not delivered" - the driver has to give a reason next
    pub fn decline(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.step, Step::Idle) {
            Step::AwaitingConfirmation(stop) => {
                self.step = Step::AwaitingReason(stop);
                Ok(())
            }
            other => {
                self.step = other;
                Err(ErrorKind::NoPendingConfirmation.into())
            }
        }
    }

    /// Commits the declined stop as failed.
    ///
    /// An empty reason is rejected and the dialog keeps waiting for one.
    pub fn submit_reason(&mut self, reason: &str) -> Result<Snapshot> {
        let stop = match &self.step {
            Step::AwaitingReason(stop) => stop.clone(),
            _ => return Err(ErrorKind::NoPendingConfirmation.into()),
        };
        if reason.trim().is_empty() {
            return Err(ErrorKind::MissingReason.into());
        }
        self.step = Step::Idle;
        self.tracker
            .confirm_failed(&self.freight_id, &stop.label(), reason, &self.actor)
    }

    pub fn cancel(&mut self) {
        self.step = Step::Idle;
    }
}
