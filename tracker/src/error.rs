use freight_types::{FreightId, PatchError, ShipmentStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// The kind of error, for callers that need to react to specific failures
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// `true` if repeating the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Conflict { .. } | ErrorKind::Db(_) | ErrorKind::StaleState { .. }
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(value: ErrorKind) -> Self {
        Error { kind: value }
    }
}

impl From<freight_kv_store::Error> for Error {
    fn from(value: freight_kv_store::Error) -> Self {
        ErrorKind::from(value).into()
    }
}

impl From<postcard::Error> for Error {
    fn from(value: postcard::Error) -> Self {
        ErrorKind::from(value).into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        ErrorKind::from(value).into()
    }
}

impl From<PatchError> for Error {
    fn from(value: PatchError) -> Self {
        ErrorKind::from(value).into()
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    // --- Ledger
    /// The stop has already been confirmed as delivered
    #[error("stop '{stop}' has already been delivered")]
    AlreadyDelivered { stop: String },

    /// A failed stop needs a reason
    #[error("a reason is required to mark a stop as not delivered")]
    MissingReason,

    // --- Shipment
    #[error("freight {freight_id} is already finalized")]
    ShipmentAlreadyFinalized { freight_id: FreightId },

    #[error("cannot {action} while freight {freight_id} is {status}")]
    InvalidTransition {
        freight_id: FreightId,
        status: ShipmentStatus,
        action: &'static str,
    },

    #[error("stop '{stop}' is not part of the itinerary of freight {freight_id}")]
    UnknownStop { freight_id: FreightId, stop: String },

    /// The stop is no longer (or not yet) the one awaiting confirmation
    #[error("stop '{stop}' is not actionable - next actionable stop is {next}")]
    StaleState { stop: String, next: String },

    // --- Record store
    /// Every optimistic-concurrency attempt lost against a concurrent writer
    #[error("freight {freight_id} was modified concurrently ({attempts} attempts)")]
    Conflict { freight_id: FreightId, attempts: u32 },

    #[error("freight {freight_id} not found")]
    FreightNotFound { freight_id: FreightId },

    #[error("freight {freight_id} already exists")]
    FreightExists { freight_id: FreightId },

    #[error("rejected record update - {0}")]
    Patch(#[from] PatchError),

    // --- Confirmation workflow
    #[error("no confirmation is pending")]
    NoPendingConfirmation,

    // --- Low-level
    /// Storage errors
    #[error("storage error - {0}")]
    Db(#[from] freight_kv_store::Error),

    /// Binary-Encoding (postcard) related errors
    #[error("encoding error (binary) - {0}")]
    BinaryEncoding(#[from] postcard::Error),

    /// Json-Encoding related errors
    #[error("encoding error (json) - {0}")]
    JsonEncoding(#[from] serde_json::Error),
}
