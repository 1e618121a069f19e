//! # Freight tracker
//!
//! Tracks the delivery progress of contracted freights across their stops.
//!
//! A freight moves from `waiting` over `loading` and `in_transit` to `delivered`. While in
//! transit the driver resolves the stops of the itinerary one after another, either as
//! delivered or as not delivered (with a reason). Once the last stop is resolved, the
//! freight is finalized. Every change is recorded in an append-only history.
//!
//! All changes go through the [`Tracker`], which persists them via a [`FreightStore`]
//! using optimistic concurrency, so several actors can work on the same freight.
//!
//! ```no_run
//! use freight_tracker::{store::MemoryStore, Tracker};
//! use freight_types::{Actor, FreightId, Itinerary};
//!
//! # fn main() -> freight_tracker::Result<()> {
//! let tracker = Tracker::new(MemoryStore::new());
//! let id = FreightId::new("MAPA-1001");
//! let route = serde_json::json!({ "stops": [ { "city": "Campinas", "state": "SP" } ] });
//! tracker.register(&id, Itinerary::from_json(&route).as_ref())?;
//!
//! let driver = Actor::new("drv-42", "Marcos");
//! tracker.start_loading(&id, &driver)?;
//! tracker.start_transit(&id, &driver)?;
//! if let Some(stop) = tracker.prompt_next_stop(&id)? {
//!     tracker.confirm_delivered(&id, &stop.label(), &driver)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod journal;
pub mod ledger;
pub mod service;
pub mod shipment;
pub mod stops;
pub mod store;
pub mod workflow;

pub use config::TrackerConfig;
pub use error::{Error, ErrorKind, Result};
pub use journal::Journal;
pub use ledger::{FailedStop, Ledger, StopRef};
pub use service::{Snapshot, Tracker};
pub use shipment::{Progress, Shipment};
pub use store::{FreightStore, WriteOutcome};
pub use workflow::{Confirmation, Step};
