//! Marketplace Order Flow Engine
//!
//! This library is the client-side engine behind the marketplace's buyer ("My Orders") and seller ("I Sold") order
//! views. It owns no rendering, no persistence and no wire protocol; the presentation layer embeds it and supplies
//! an [`OrderGateway`] implementation for the order backend. The engine is responsible for three things the UI must
//! never improvise:
//!
//! 1. **Transition legality.** Every user-initiated command (cancel, refund, complete, rename, re-address, edit
//!    notes) is gated by the order's current status through a [`StatusPolicy`] that the catalog service can
//!    override at runtime, with built-in fallback sets when it has not.
//! 2. **Quantity accounting.** Partial cancellations and refunds are validated at the line-item level
//!    ([`mod@commands`]) and shaped into commands for the gateway; the engine never mutates quantities locally —
//!    it re-fetches the order after every successful write and treats the server's answer as the only truth.
//! 3. **Escrow timing.** The auto-release deadline of a delivered order is a pure function of the delivery
//!    timestamp and the clock ([`mod@escrow`]), recomputed on every tick the view chooses to drive, so it advances
//!    monotonically whether or not a view is open.
//!
//! One shared order aggregate is projected into two disjoint role-scoped views ([`mod@ofe_api`]): the buyer sees
//! everything, a seller sees only their own items and totals. The seller projection leaking another seller's data
//! is treated as a correctness defect, not a cosmetic one, and is tested as such.

pub mod commands;
pub mod config;
pub mod errors;
pub mod escrow;
pub mod ofe_api;
pub mod order_types;
pub mod status_policy;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::EngineConfig;
pub use errors::OrderFlowError;
pub use ofe_api::{project, BuyerOrderView, OrderFlowApi, OrderView, SellerOrderView};
pub use status_policy::{StatusPolicy, StatusPolicyConfig};
pub use traits::{OrderGateway, OrderGatewayError, Page, SortBy, SortDirection, SortField};
