//! The engine's public, role-aware API surface: the command orchestrator and the view projections it feeds.

mod order_flow_api;
mod order_views;

pub use order_flow_api::OrderFlowApi;
pub use order_views::{project, BuyerOrderView, OrderView, SellerOrderView};
