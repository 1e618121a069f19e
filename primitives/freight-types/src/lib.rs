//! # Freight types
//!
//! Datatypes that are shared between the freight tracker and its collaborators:
//! the itinerary descriptors delivered by the route service, the canonical [`Stop`],
//! tracking events and the freight record that is persisted by the record store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub mod itinerary;
pub mod record;
pub mod tracking;

pub use chrono::{DateTime, Utc};
pub use itinerary::{Itinerary, RouteDetail, RouteStop, Stop, Waypoint};
pub use record::{record_schema, FreightRecord, PatchError, Revision, TrackingPatch};
pub use tracking::{ShipmentStatus, TechnicalStatus, TrackingEvent};

/// Identifier of a freight (the map number of the contracted transport job)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FreightId(String);

impl FreightId {
    pub fn new(id: impl Into<String>) -> Self {
        FreightId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FreightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FreightId {
    fn from(value: &str) -> Self {
        FreightId(value.to_string())
    }
}

impl From<String> for FreightId {
    fn from(value: String) -> Self {
        FreightId(value)
    }
}

impl AsRef<[u8]> for FreightId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// The person performing an action on a freight (typically the driver)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
        }
    }
}
