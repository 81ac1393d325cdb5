use chrono::{DateTime, Duration, Utc};
use ofe_common::Money;
use serde::Serialize;

use crate::{
    escrow::{escrow_window_with, EscrowWindow},
    order_types::{AddressId, Order, OrderId, OrderItem, OrderNumber, OrderStatus, PaymentStatus, SellerId, Viewer},
    status_policy::StatusPolicy,
};

//--------------------------------------      OrderView         ------------------------------------------------------
/// A role-scoped projection of one order aggregate. Produced fresh from each immutable snapshot; two open views of
/// the same order never share mutable state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "view")]
pub enum OrderView {
    Buyer(BuyerOrderView),
    Seller(SellerOrderView),
}

impl OrderView {
    pub fn escrow(&self) -> Option<&EscrowWindow> {
        match self {
            OrderView::Buyer(v) => v.escrow.as_ref(),
            OrderView::Seller(v) => v.escrow.as_ref(),
        }
    }
}

/// Everything the buyer who placed the order is entitled to see, plus the action affordances the current status
/// policy grants them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerOrderView {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub name: String,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub escrow_amount: Money,
    pub notes: Option<String>,
    pub shipping_address_id: AddressId,
    pub billing_address_id: Option<AddressId>,
    pub escrow: Option<EscrowWindow>,
    pub can_cancel: bool,
    pub can_refund: bool,
    pub can_modify: bool,
    /// Manual completion shares the refund eligibility window: it exists to pre-empt the auto-release of a
    /// delivered order.
    pub can_complete: bool,
}

/// The restricted projection for one seller: only their items, only their totals, and none of the buyer's notes,
/// addresses or edit affordances. The raw aggregate may contain other sellers' items; they must never appear here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerOrderView {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub seller_id: SellerId,
    pub items: Vec<OrderItem>,
    pub seller_total: Money,
    pub escrow: Option<EscrowWindow>,
}

/// Project an order snapshot for the given viewer as of `now`, attaching escrow timing while the order sits in the
/// delivered/countdown phase.
pub fn project(
    order: &Order,
    viewer: &Viewer,
    policy: &StatusPolicy,
    now: DateTime<Utc>,
    release_window: Duration,
) -> OrderView {
    let escrow = (order.status == OrderStatus::Delivered)
        .then(|| escrow_window_with(order.delivered_at, now, release_window));
    match viewer {
        Viewer::Buyer => OrderView::Buyer(BuyerOrderView {
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            status: order.status,
            payment_status: order.payment_status,
            name: order.name.clone(),
            items: order.items.clone(),
            total: order.total_amount(),
            escrow_amount: order.escrow_amount,
            notes: order.notes.clone(),
            shipping_address_id: order.shipping_address_id.clone(),
            billing_address_id: order.billing_address_id.clone(),
            escrow,
            can_cancel: policy.is_cancellable(&order.status),
            can_refund: policy.is_refundable(&order.status),
            can_modify: policy.is_modifiable(&order.status),
            can_complete: policy.is_refundable(&order.status),
        }),
        Viewer::Seller(seller_id) => {
            let items: Vec<OrderItem> = order.items_for_seller(seller_id).cloned().collect();
            let seller_total = items.iter().map(|i| i.total_price).sum();
            OrderView::Seller(SellerOrderView {
                order_id: order.id.clone(),
                order_number: order.order_number.clone(),
                status: order.status,
                seller_id: seller_id.clone(),
                items,
                seller_total,
                escrow,
            })
        },
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use rand::seq::SliceRandom;
    use rand::Rng;

    use super::*;
    use crate::escrow::DEFAULT_ESCROW_RELEASE_WINDOW;
    use crate::test_utils::{delivered_order, sample_order, two_seller_order};

    fn project_default(order: &Order, viewer: &Viewer) -> OrderView {
        project(order, viewer, &StatusPolicy::default(), Utc::now(), DEFAULT_ESCROW_RELEASE_WINDOW)
    }

    #[test]
    fn buyer_view_carries_all_items_and_affordances() {
        let order = two_seller_order();
        let OrderView::Buyer(view) = project_default(&order, &Viewer::Buyer) else {
            panic!("expected buyer view");
        };
        assert_eq!(view.items.len(), order.items.len());
        assert_eq!(view.total, order.total_amount());
        assert!(view.can_cancel, "pending orders are cancellable by default");
        assert!(!view.can_refund);
        assert!(!view.can_complete);
        assert!(view.escrow.is_none(), "no escrow countdown before delivery");
    }

    #[test]
    fn seller_view_never_leaks_other_sellers() {
        let order = two_seller_order();
        let seller_a = SellerId::from("seller-a");
        let OrderView::Seller(view) = project_default(&order, &Viewer::Seller(seller_a.clone())) else {
            panic!("expected seller view");
        };
        assert!(!view.items.is_empty());
        assert!(view.items.iter().all(|i| i.seller_id == seller_a));
        let expected: Money = order.items_for_seller(&seller_a).map(|i| i.total_price).sum();
        assert_eq!(view.seller_total, expected);
        assert!(view.seller_total < order.total_amount());
    }

    #[test]
    fn seller_with_no_items_sees_an_empty_view() {
        let order = two_seller_order();
        let OrderView::Seller(view) = project_default(&order, &Viewer::Seller(SellerId::from("seller-z"))) else {
            panic!("expected seller view");
        };
        assert!(view.items.is_empty());
        assert_eq!(view.seller_total, Money::from(0));
    }

    #[test]
    fn delivered_orders_attach_the_escrow_countdown_for_both_roles() {
        let order = delivered_order();
        let now = order.delivered_at.unwrap() + Duration::hours(24);
        for viewer in [Viewer::Buyer, Viewer::Seller(SellerId::from("seller-a"))] {
            let view = project(&order, &viewer, &StatusPolicy::default(), now, DEFAULT_ESCROW_RELEASE_WINDOW);
            let escrow = view.escrow().expect("delivered order must expose escrow timing");
            assert!(!escrow.is_expired);
            assert_eq!(escrow.remaining_time().unwrap().hours, 24);
        }
        if let OrderView::Buyer(view) = project(&order, &Viewer::Buyer, &StatusPolicy::default(), now, DEFAULT_ESCROW_RELEASE_WINDOW) {
            assert!(view.can_complete, "delivered orders can be completed manually");
            assert!(view.can_refund);
        }
    }

    #[test]
    fn escrow_is_not_attached_outside_the_delivered_phase() {
        let mut order = delivered_order();
        order.status = crate::order_types::OrderStatus::Completed;
        let view = project_default(&order, &Viewer::Buyer);
        assert!(view.escrow().is_none());
    }

    // Randomized variant of the isolation property: whatever mix of sellers an aggregate contains, a seller
    // projection contains exactly that seller's items and sum.
    #[test]
    fn mini_fuzz_seller_isolation() {
        let sellers = ["seller-a", "seller-b", "seller-c", "seller-d"];
        let mut rng = rand::thread_rng();
        for round in 0..200 {
            let mut order = sample_order();
            order.items.clear();
            let n_items = rng.gen_range(1..=8);
            for i in 0..n_items {
                let mut item = two_seller_order().items[0].clone();
                item.id = crate::order_types::ItemId::from(format!("fuzz-{round}-{i}"));
                item.seller_id = SellerId::from(*sellers.choose(&mut rng).unwrap());
                item.total_price = Money::from(rng.gen_range(1..10_000));
                order.items.push(item);
            }
            let target = SellerId::from(*sellers.choose(&mut rng).unwrap());
            let OrderView::Seller(view) = project_default(&order, &Viewer::Seller(target.clone())) else {
                panic!("expected seller view");
            };
            let expected_ids: Vec<_> =
                order.items.iter().filter(|i| i.seller_id == target).map(|i| i.id.clone()).collect();
            assert_eq!(view.items.iter().map(|i| i.id.clone()).collect::<Vec<_>>(), expected_ids);
            let expected_total: Money = order.items_for_seller(&target).map(|i| i.total_price).sum();
            assert_eq!(view.seller_total, expected_total);
        }
    }
}
