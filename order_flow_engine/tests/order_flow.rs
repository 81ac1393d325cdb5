//! End-to-end command flows against the in-memory gateway: gating, refetch-after-write, conflict handling and
//! command serialization.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use ofe_common::Money;
use order_flow_engine::{
    commands::{CancelReason, RefundReason},
    order_types::{AddressId, ItemId, OrderStatus, SellerId, Viewer},
    test_utils::{delivered_order, sample_order, two_seller_order, MemoryGateway},
    EngineConfig, OrderFlowApi, OrderFlowError, OrderGateway, OrderGatewayError, OrderView, StatusPolicyConfig,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn api_with(orders: Vec<order_flow_engine::order_types::Order>) -> (OrderFlowApi<MemoryGateway>, MemoryGateway) {
    init_logging();
    let gateway = MemoryGateway::with_orders(orders);
    (OrderFlowApi::new(gateway.clone()), gateway)
}

#[tokio::test]
async fn full_cancel_refetches_the_cancelled_order() {
    let order = sample_order();
    let (api, gateway) = api_with(vec![order.clone()]);

    let fresh = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap();
    assert_eq!(fresh.status, OrderStatus::Cancelled);
    assert!(fresh.invariants_hold());

    let submitted = gateway.submitted_cancels();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, order.id);
    assert_eq!(submitted[0].1.order_item_ids, None, "full cancel must not carry an item list");
}

#[tokio::test]
async fn partial_cancel_leaves_other_items_untouched() {
    // item-a qty 3, item-b qty 2; cancelling all of A must not touch B
    let order = two_seller_order();
    let (api, gateway) = api_with(vec![order.clone()]);
    let item_a = ItemId::from("item-a");

    let fresh = api
        .cancel(&order, CancelReason::OrderedByMistake, Some("duplicate order"), Some(std::slice::from_ref(&item_a)))
        .await
        .unwrap();

    // partial cancellation leaves the order status to the server's discretion (here: unchanged)
    assert_eq!(fresh.status, OrderStatus::Pending);
    assert_eq!(fresh.item(&item_a).unwrap().cancelled_quantity, 3);
    assert_eq!(fresh.item(&ItemId::from("item-b")).unwrap().cancelled_quantity, 0);
    assert!(fresh.invariants_hold());
    assert_eq!(gateway.submitted_cancels()[0].1.order_item_ids, Some(vec![item_a]));
}

#[tokio::test]
async fn ineligible_commands_never_reach_the_gateway() {
    let mut order = sample_order();
    order.status = OrderStatus::Shipped;
    let (api, gateway) = api_with(vec![order.clone()]);

    let err = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StateIneligible { action: "cancel", status: OrderStatus::Shipped }));
    assert!(gateway.submitted_cancels().is_empty());

    // refund before delivery is rejected the same way
    let err = api.refund(&order, RefundReason::Defective, None, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StateIneligible { action: "refund", .. }));
    assert!(gateway.submitted_refunds().is_empty());
}

#[tokio::test]
async fn refund_then_inspect_quantities() {
    let order = delivered_order();
    let (api, gateway) = api_with(vec![order.clone()]);
    let item_b = ItemId::from("item-b");

    let fresh = api
        .refund(&order, RefundReason::DamagedInTransit, Some("box crushed"), Some(std::slice::from_ref(&item_b)))
        .await
        .unwrap();
    assert_eq!(fresh.item(&item_b).unwrap().refunded_quantity, 2);
    assert_eq!(fresh.item(&ItemId::from("item-a")).unwrap().refunded_quantity, 0);
    assert!(fresh.invariants_hold());
    assert_eq!(gateway.submitted_refunds().len(), 1);
}

#[tokio::test]
async fn complete_pre_empts_the_auto_release() {
    let order = delivered_order();
    let (api, gateway) = api_with(vec![order.clone()]);

    let fresh = api.complete(&order).await.unwrap();
    assert_eq!(fresh.status, OrderStatus::Completed);
    assert_eq!(fresh.escrow_amount, Money::from(0));
    assert_eq!(gateway.submitted_completions(), vec![order.id.clone()]);

    // a pending order cannot be completed: the window only opens on delivery
    let pending = sample_order();
    let (api, gateway) = api_with(vec![pending.clone()]);
    let err = api.complete(&pending).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StateIneligible { action: "complete", .. }));
    assert!(gateway.submitted_completions().is_empty());
}

#[tokio::test]
async fn conflict_surfaces_with_a_fresh_snapshot() {
    let order = sample_order();
    let (api, gateway) = api_with(vec![order.clone()]);
    gateway.fail_next_write(OrderGatewayError::Conflict("status changed to SHIPPED".to_string()));

    let err = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap_err();
    let OrderFlowError::StateConflict { id, latest } = err else {
        panic!("expected a state conflict, got {err:?}");
    };
    assert_eq!(id, order.id);
    // the mandatory refetch rode along with the error
    assert_eq!(latest.unwrap().id, order.id);
    assert!(gateway.submitted_cancels().is_empty(), "the failed write must not be recorded");
}

#[tokio::test]
async fn network_failures_are_surfaced_and_never_retried() {
    let order = sample_order();
    let (api, gateway) = api_with(vec![order.clone()]);
    gateway.fail_next_write(OrderGatewayError::Network("connection reset".to_string()));

    let err = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::TransientNetwork(_)));
    assert!(gateway.submitted_cancels().is_empty(), "no automatic retry of writes");

    // the user re-initiates explicitly, and this time it goes through
    let fresh = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap();
    assert_eq!(fresh.status, OrderStatus::Cancelled);
    assert_eq!(gateway.submitted_cancels().len(), 1);
}

#[tokio::test]
async fn commands_on_the_same_order_are_serialized() {
    let order = sample_order();
    init_logging();
    let gateway = MemoryGateway::with_orders(vec![order.clone()]);
    gateway.delay_writes(StdDuration::from_millis(100));
    let api = Arc::new(OrderFlowApi::new(gateway.clone()));

    let first = {
        let api = Arc::clone(&api);
        let order = order.clone();
        tokio::spawn(async move { api.cancel(&order, CancelReason::ChangedMind, None, None).await })
    };
    // give the first command time to acquire the in-flight slot and park in the gateway
    tokio::time::sleep(StdDuration::from_millis(20)).await;

    let err = api.rename(&order, "too eager").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::CommandInFlight(id) if id == order.id));

    let fresh = first.await.unwrap().unwrap();
    assert_eq!(fresh.status, OrderStatus::Cancelled);

    // once the first command settled, the slot is free again (rename now fails on the gate instead)
    let err = api.rename(&fresh, "renamed").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StateIneligible { action: "rename", status: OrderStatus::Cancelled }));
}

#[tokio::test]
async fn edit_commands_commit_through_the_gateway() {
    let order = sample_order();
    let (api, _gateway) = api_with(vec![order.clone()]);

    let fresh = api.rename(&order, "  Office upgrade  ").await.unwrap();
    assert_eq!(fresh.name, "Office upgrade");

    let fresh = api.edit_notes(&fresh, "leave at the back door").await.unwrap();
    assert_eq!(fresh.notes.as_deref(), Some("leave at the back door"));

    let fresh = api.edit_address(&fresh, &AddressId::from("addr-ship-2"), None).await.unwrap();
    assert_eq!(fresh.shipping_address_id, AddressId::from("addr-ship-2"));
    assert_eq!(fresh.billing_address_id, None);

    // validation failures stay local
    let err = api.rename(&fresh, "   ").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Validation(_)));
    let err = api.edit_notes(&fresh, &"n".repeat(1001)).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Validation(_)));
}

#[tokio::test]
async fn server_policy_overrides_reshape_the_gates() {
    let mut order = sample_order();
    order.status = OrderStatus::Processing;
    let (api, gateway) = api_with(vec![order.clone()]);

    // not cancellable under the defaults
    let err = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StateIneligible { .. }));

    // the backend widens the cancellable window; the policy TTL has not expired, so force a fresh api
    gateway.set_policy_config(StatusPolicyConfig {
        cancellable: Some(["PENDING".to_string(), "CONFIRMED".to_string(), "PROCESSING".to_string()].into()),
        ..Default::default()
    });
    let api = OrderFlowApi::new(gateway.clone());
    let fresh = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap();
    assert_eq!(fresh.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn policy_cache_honours_its_ttl() {
    let (api, gateway) = api_with(vec![]);
    // default TTL: the second read is served from cache
    let _ = api.policy().await;
    let _ = api.policy().await;
    assert_eq!(gateway.policy_fetch_count(), 1);

    // zero TTL: every read goes back to the gateway
    let config = EngineConfig { policy_ttl: Duration::zero(), ..Default::default() };
    let api = OrderFlowApi::with_config(gateway.clone(), config);
    let _ = api.policy().await;
    let _ = api.policy().await;
    assert_eq!(gateway.policy_fetch_count(), 3);
}

#[tokio::test]
async fn policy_refresh_failure_degrades_to_defaults() {
    let order = sample_order();
    init_logging();

    // a gateway whose policy endpoint always fails
    #[derive(Clone)]
    struct NoPolicyGateway(MemoryGateway);
    impl OrderGateway for NoPolicyGateway {
        async fn fetch_order(
            &self,
            id: &order_flow_engine::order_types::OrderId,
        ) -> Result<order_flow_engine::order_types::Order, OrderGatewayError> {
            self.0.fetch_order(id).await
        }

        async fn fetch_order_by_number(
            &self,
            number: &order_flow_engine::order_types::OrderNumber,
        ) -> Result<order_flow_engine::order_types::Order, OrderGatewayError> {
            self.0.fetch_order_by_number(number).await
        }

        async fn fetch_orders_page(
            &self,
            viewer: &Viewer,
            page: u32,
            page_size: u32,
            sort: Option<order_flow_engine::SortBy>,
        ) -> Result<order_flow_engine::Page<order_flow_engine::order_types::Order>, OrderGatewayError> {
            self.0.fetch_orders_page(viewer, page, page_size, sort).await
        }

        async fn submit_cancel(
            &self,
            id: &order_flow_engine::order_types::OrderId,
            command: &order_flow_engine::commands::CancelCommand,
        ) -> Result<(), OrderGatewayError> {
            self.0.submit_cancel(id, command).await
        }

        async fn submit_refund(
            &self,
            id: &order_flow_engine::order_types::OrderId,
            command: &order_flow_engine::commands::RefundCommand,
        ) -> Result<(), OrderGatewayError> {
            self.0.submit_refund(id, command).await
        }

        async fn submit_complete(
            &self,
            id: &order_flow_engine::order_types::OrderId,
        ) -> Result<(), OrderGatewayError> {
            self.0.submit_complete(id).await
        }

        async fn update_name(
            &self,
            id: &order_flow_engine::order_types::OrderId,
            name: &str,
        ) -> Result<(), OrderGatewayError> {
            self.0.update_name(id, name).await
        }

        async fn update_notes(
            &self,
            id: &order_flow_engine::order_types::OrderId,
            notes: &str,
        ) -> Result<(), OrderGatewayError> {
            self.0.update_notes(id, notes).await
        }

        async fn update_address(
            &self,
            id: &order_flow_engine::order_types::OrderId,
            shipping: &AddressId,
            billing: Option<&AddressId>,
        ) -> Result<(), OrderGatewayError> {
            self.0.update_address(id, shipping, billing).await
        }

        async fn fetch_pending_escrow_amount(&self) -> Result<Money, OrderGatewayError> {
            self.0.fetch_pending_escrow_amount().await
        }

        async fn fetch_status_policy_config(&self) -> Result<StatusPolicyConfig, OrderGatewayError> {
            Err(OrderGatewayError::Network("policy endpoint unreachable".to_string()))
        }
    }

    let gateway = NoPolicyGateway(MemoryGateway::with_orders(vec![order.clone()]));
    let api = OrderFlowApi::new(gateway);

    // the built-in defaults still gate commands correctly
    let fresh = api.cancel(&order, CancelReason::ChangedMind, None, None).await.unwrap();
    assert_eq!(fresh.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn views_and_aggregates_read_through_the_api() {
    let order = delivered_order();
    let (api, gateway) = api_with(vec![order.clone()]);
    gateway.set_pending_escrow(Money::from(11_500));

    assert_eq!(api.pending_escrow().await.unwrap(), Money::from(11_500));

    let now = order.delivered_at.unwrap() + Duration::hours(24);
    let view = api.view(&order, &Viewer::Buyer, now).await;
    let OrderView::Buyer(buyer) = view else { panic!("expected buyer view") };
    let escrow = buyer.escrow.expect("delivered order exposes the countdown");
    assert_eq!(escrow.remaining_time().unwrap().hours, 24);
    assert!(buyer.can_complete);

    let view = api.view(&order, &Viewer::Seller(SellerId::from("seller-b")), now).await;
    let OrderView::Seller(seller) = view else { panic!("expected seller view") };
    assert!(seller.items.iter().all(|i| i.seller_id == SellerId::from("seller-b")));
    assert_eq!(seller.seller_total, Money::from(8_000));

    // the seller's paginated listing only contains orders with their items
    let page = api.orders_page(&Viewer::Seller(SellerId::from("seller-b")), 0, 10, None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    let page = api.orders_page(&Viewer::Seller(SellerId::from("seller-z")), 0, 10, None).await.unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn fetching_a_missing_order_is_not_found() {
    let (api, _gateway) = api_with(vec![]);
    let err = api.order(&"ord-missing".parse().unwrap()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotFound(_)));

    let err = api.order_by_number(&"MKT-0000".into()).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::NotFound(_)));
}
