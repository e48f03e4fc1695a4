use thiserror::Error;

/// Errors that abort a whole tick (never the process).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] remindd_store::StoreError),
}

/// A per-target send failure reported by the messenger. Recorded and
/// retried on a later tick, never escalated.
#[derive(Debug, Clone, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
