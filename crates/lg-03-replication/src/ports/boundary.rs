//! Driving port: how the facade reaches the total-order primitive.

use async_trait::async_trait;

use crate::domain::{OrderedReply, ReplicationError};

/// Total-order broadcast as seen by the ledger facade.
#[async_trait]
pub trait ReplicationBoundary: Send + Sync {
    /// Submit encoded command bytes for ordering.
    ///
    /// Resolves once the command has been delivered in total order and
    /// applied locally, with the agreed encoded result. Cannot be
    /// cancelled once submitted; a timeout is reported as
    /// [`ReplicationError::ExecutionUncertain`].
    async fn submit_ordered(&self, command: Vec<u8>) -> Result<OrderedReply, ReplicationError>;

    /// Submit an encoded read-only query, served without agreement.
    async fn submit_unordered(&self, query: Vec<u8>) -> Result<Vec<u8>, ReplicationError>;
}
