//! Test support: canonical order fixtures and an in-memory [`crate::traits::OrderGateway`] implementation.
//!
//! `MemoryGateway` emulates just enough of the backend's cancel/refund bookkeeping for refetch-after-write flows to
//! be exercised end to end without a server. It is not a reference implementation of the backend's business rules.

mod memory_gateway;

use chrono::{TimeZone, Utc};
use ofe_common::Money;

pub use memory_gateway::MemoryGateway;

use crate::order_types::{AddressId, ItemId, Order, OrderItem, OrderStatus, PaymentStatus, SellerId};

fn item(id: &str, seller: &str, quantity: u32, unit_price_cents: i64) -> OrderItem {
    OrderItem {
        id: ItemId::from(id),
        product_name: format!("Product {id}"),
        quantity,
        unit_price: Money::from(unit_price_cents),
        total_price: Money::from(unit_price_cents * i64::from(quantity)),
        cancelled_quantity: 0,
        refunded_quantity: 0,
        seller_id: SellerId::from(seller),
        campaign_name: None,
    }
}

/// A freshly placed single-seller order in `Pending` status.
pub fn sample_order() -> Order {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    Order {
        id: "ord-1001".parse().unwrap(),
        order_number: "MKT-2024-1001".into(),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Authorized,
        escrow_amount: Money::from(7_500),
        delivered_at: None,
        items: vec![item("item-1", "seller-a", 1, 2_500), item("item-2", "seller-a", 2, 2_500)],
        shipping_address_id: AddressId::from("addr-ship-1"),
        billing_address_id: Some(AddressId::from("addr-bill-1")),
        name: "Desk refresh".to_string(),
        notes: None,
        created_at: created,
        updated_at: created,
    }
}

/// A pending order with items from two different sellers: item-a (qty 3) and item-c belong to seller-a, item-b
/// (qty 2) to seller-b.
pub fn two_seller_order() -> Order {
    let mut order = sample_order();
    order.id = "ord-2002".parse().unwrap();
    order.order_number = "MKT-2024-2002".into();
    order.items =
        vec![item("item-a", "seller-a", 3, 1_000), item("item-b", "seller-b", 2, 4_000), item("item-c", "seller-a", 1, 500)];
    order.escrow_amount = Money::from(11_500);
    order
}

/// A delivered two-seller order, one day into its escrow countdown at `delivered_at + 24h`.
pub fn delivered_order() -> Order {
    let mut order = two_seller_order();
    order.id = "ord-3003".parse().unwrap();
    order.order_number = "MKT-2024-3003".into();
    order.status = OrderStatus::Delivered;
    order.payment_status = PaymentStatus::Captured;
    order.delivered_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    order.updated_at = order.delivered_at.unwrap();
    order
}
