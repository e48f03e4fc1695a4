use async_trait::async_trait;

use crate::error::DeliveryError;

/// Transport used to deliver reminder messages.
///
/// Implementors are responsible for their own send timeouts; the engine
/// awaits each send to completion and only marks a target delivered on
/// `Ok`.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Whether the transport is currently usable for `identity`.
    /// A disconnected transport turns the whole tick into a no-op.
    async fn is_connected(&self, identity: &str) -> bool;

    /// Deliver `message` to a single target.
    async fn send(&self, identity: &str, target: &str, message: &str) -> Result<(), DeliveryError>;
}
