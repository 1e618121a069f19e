use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::Actor;

/// Defines where a freight is in the loading→delivery flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Contracted, not yet loading
    Waiting,
    /// Cargo is being loaded
    Loading,
    /// Loaded and en route to the next stop
    InTransit,
    /// All stops resolved (terminal)
    Delivered,
}

impl ShipmentStatus {
    /// `true` for the terminal status
    pub fn is_final(&self) -> bool {
        matches!(self, ShipmentStatus::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Waiting => "waiting",
            ShipmentStatus::Loading => "loading",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::Delivered => "delivered",
        }
    }
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded with a tracking event
///
/// Mirrors [`ShipmentStatus`], plus a marker for stops that could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalStatus {
    Waiting,
    Loading,
    InTransit,
    Delivered,
    DeliveryNotCompleted,
}

impl From<ShipmentStatus> for TechnicalStatus {
    fn from(value: ShipmentStatus) -> Self {
        match value {
            ShipmentStatus::Waiting => TechnicalStatus::Waiting,
            ShipmentStatus::Loading => TechnicalStatus::Loading,
            ShipmentStatus::InTransit => TechnicalStatus::InTransit,
            ShipmentStatus::Delivered => TechnicalStatus::Delivered,
        }
    }
}

/// Entry of the tracking history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TrackingEvent {
    pub technical_status: TechnicalStatus,
    /// Human readable description, shown to shipper and driver
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_name: String,
}

impl TrackingEvent {
    pub fn new(
        technical_status: TechnicalStatus,
        message: impl Into<String>,
        actor: &Actor,
        timestamp: DateTime<Utc>,
    ) -> Self {
        TrackingEvent {
            technical_status,
            message: message.into(),
            timestamp,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
        }
    }
}
