//! Interface contracts between the engine and its external collaborators.
//!
//! The engine owns no persistent state and no wire protocol of its own. Everything it knows about an order comes
//! from an [`OrderGateway`] implementation supplied by the embedding application; everything it wants to change goes
//! back out through the same trait. `test_utils::MemoryGateway` (behind the `test_utils` feature) is the reference
//! in-memory implementation used by the test suite.

mod order_gateway;

pub use order_gateway::{OrderGateway, OrderGatewayError, Page, SortBy, SortDirection, SortField};
