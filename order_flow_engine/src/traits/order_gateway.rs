use serde::{Deserialize, Serialize};
use thiserror::Error;

use ofe_common::Money;

use crate::{
    commands::{CancelCommand, RefundCommand},
    order_types::{AddressId, Order, OrderId, OrderNumber, Viewer},
    status_policy::StatusPolicyConfig,
};

/// The order backend as seen from this client.
///
/// Reads return immutable snapshots; the engine re-reads after every successful write rather than guessing at the
/// resulting state (partial cancel/refund bookkeeping is done server-side, and a local guess can silently diverge).
///
/// Write operations must not be retried automatically by implementations: a duplicate `submit_cancel` is a duplicate
/// side effect. Reads may be retried with backoff at the implementer's discretion.
#[allow(async_fn_in_trait)]
pub trait OrderGateway {
    /// Fetch a single order by its backend id.
    async fn fetch_order(&self, id: &OrderId) -> Result<Order, OrderGatewayError>;

    /// Fetch a single order by its human-facing order number.
    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Order, OrderGatewayError>;

    /// Fetch one page of the viewer's orders. For [`Viewer::Buyer`] this is "My Orders"; for [`Viewer::Seller`] it is
    /// the "I Sold" listing, already restricted server-side to orders containing that seller's items.
    async fn fetch_orders_page(
        &self,
        viewer: &Viewer,
        page: u32,
        page_size: u32,
        sort: Option<SortBy>,
    ) -> Result<Page<Order>, OrderGatewayError>;

    /// Submit a validated cancellation. `command.order_item_ids = None` cancels the whole order.
    async fn submit_cancel(&self, id: &OrderId, command: &CancelCommand) -> Result<(), OrderGatewayError>;

    /// Submit a validated refund request. Same selection semantics as [`Self::submit_cancel`].
    async fn submit_refund(&self, id: &OrderId, command: &RefundCommand) -> Result<(), OrderGatewayError>;

    /// Request immediate finalization of a delivered order, pre-empting the escrow auto-release.
    async fn submit_complete(&self, id: &OrderId) -> Result<(), OrderGatewayError>;

    async fn update_name(&self, id: &OrderId, name: &str) -> Result<(), OrderGatewayError>;

    async fn update_notes(&self, id: &OrderId, notes: &str) -> Result<(), OrderGatewayError>;

    async fn update_address(
        &self,
        id: &OrderId,
        shipping: &AddressId,
        billing: Option<&AddressId>,
    ) -> Result<(), OrderGatewayError>;

    /// The total amount currently held in escrow across the viewer's pending orders.
    async fn fetch_pending_escrow_amount(&self) -> Result<Money, OrderGatewayError>;

    /// The (possibly partial, possibly absent) status policy overrides. Missing keys fall back to the engine's
    /// built-in defaults; see [`crate::status_policy::StatusPolicy::merge`].
    async fn fetch_status_policy_config(&self) -> Result<StatusPolicyConfig, OrderGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderGatewayError {
    /// The order id or number does not resolve to anything.
    #[error("The requested order {0} does not exist")]
    NotFound(OrderId),
    /// The backend rejected a write because the order's authoritative status changed since our last read.
    #[error("The order state changed on the server: {0}")]
    Conflict(String),
    /// Transport-level failure. Reads may be retried by the caller; writes must be re-initiated explicitly.
    #[error("Network error talking to the order backend: {0}")]
    Network(String),
    /// The backend reported an internal failure.
    #[error("Order backend error: {0}")]
    Backend(String),
}

//--------------------------------------        Page<T>         ------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.page_size))
    }

    pub fn is_last(&self) -> bool {
        u64::from(self.page) + 1 >= self.total_pages()
    }
}

//--------------------------------------        SortBy          ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    TotalAmount,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn newest_first() -> Self {
        Self { field: SortField::CreatedAt, direction: SortDirection::Descending }
    }
}
