use thiserror::Error;

use crate::{
    order_types::{OrderId, OrderStatus},
    traits::OrderGatewayError,
};

/// The complete failure taxonomy for user-initiated order commands.
///
/// `Validation` and `StateIneligible` are produced locally, before any network call is attempted. The remaining
/// variants surface gateway failures; none of them are swallowed or silently retried by the engine — every command
/// returns success or one specific error for the caller to render.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    /// Malformed local input: missing reason, empty selection, oversize text. Never sent to the server.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The command was attempted while the status policy gate is false. Caught before any network call.
    #[error("Cannot {action} an order in status {status}")]
    StateIneligible { action: &'static str, status: OrderStatus },

    /// The server rejected the write because the order's true status changed between read and write. The engine has
    /// already forced a refetch; `latest` carries the fresh snapshot (when that refetch itself succeeded) so the
    /// caller can re-render before the user retries.
    #[error("Order {id} changed on the server while the command was in flight; retry after reviewing the new state")]
    StateConflict { id: OrderId, latest: Option<Box<crate::order_types::Order>> },

    #[error("Order {0} does not exist")]
    NotFound(OrderId),

    /// Transport failure. Reads may be retried with backoff by the caller; writes are never retried automatically,
    /// to avoid duplicate side effects.
    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("Order backend error: {0}")]
    Backend(String),

    /// A second command was issued for an order that already has one in flight. Commands on the same order are
    /// strictly serialized; the first must settle before another may be sent.
    #[error("A command for order {0} is already in flight")]
    CommandInFlight(OrderId),
}

impl OrderFlowError {
    /// Map a gateway failure for a command against a known order. A `Conflict` becomes a [`StateConflict`] carrying
    /// the order id so the caller knows which view to refresh.
    ///
    /// [`StateConflict`]: OrderFlowError::StateConflict
    pub(crate) fn from_gateway(err: OrderGatewayError, id: &OrderId) -> Self {
        match err {
            OrderGatewayError::NotFound(id) => OrderFlowError::NotFound(id),
            OrderGatewayError::Conflict(_) => OrderFlowError::StateConflict { id: id.clone(), latest: None },
            OrderGatewayError::Network(msg) => OrderFlowError::TransientNetwork(msg),
            OrderGatewayError::Backend(msg) => OrderFlowError::Backend(msg),
        }
    }
}

/// For gateway calls that are not about one specific order (pages, aggregates, policy config).
impl From<OrderGatewayError> for OrderFlowError {
    fn from(err: OrderGatewayError) -> Self {
        match err {
            OrderGatewayError::NotFound(id) => OrderFlowError::NotFound(id),
            OrderGatewayError::Conflict(msg) | OrderGatewayError::Backend(msg) => OrderFlowError::Backend(msg),
            OrderGatewayError::Network(msg) => OrderFlowError::TransientNetwork(msg),
        }
    }
}
