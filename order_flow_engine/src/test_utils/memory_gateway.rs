use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ofe_common::Money;

use crate::{
    commands::{CancelCommand, RefundCommand},
    order_types::{AddressId, Order, OrderId, OrderNumber, OrderStatus, Viewer},
    status_policy::StatusPolicyConfig,
    traits::{OrderGateway, OrderGatewayError, Page, SortBy},
};

/// A scriptable in-memory order backend.
///
/// Writes apply a simplified emulation of the server's bookkeeping (full cancel flips the order status, partial
/// cancel marks quantities and leaves the status alone) so that the engine's refetch-after-write discipline can be
/// observed. Single failures can be injected ahead of the next write or the next fetch.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    policy_config: StatusPolicyConfig,
    pending_escrow: Money,
    fail_next_write: Option<OrderGatewayError>,
    fail_next_fetch: Option<OrderGatewayError>,
    write_delay: Option<std::time::Duration>,
    cancels: Vec<(OrderId, CancelCommand)>,
    refunds: Vec<(OrderId, RefundCommand)>,
    completions: Vec<OrderId>,
    policy_fetches: u32,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let gateway = Self::new();
        for order in orders {
            gateway.insert_order(order);
        }
        gateway
    }

    pub fn insert_order(&self, order: Order) {
        lock(&self.state).orders.insert(order.id.clone(), order);
    }

    pub fn set_policy_config(&self, config: StatusPolicyConfig) {
        lock(&self.state).policy_config = config;
    }

    pub fn set_pending_escrow(&self, amount: Money) {
        lock(&self.state).pending_escrow = amount;
    }

    /// The next write (cancel/refund/complete/update) fails once with `err` and is not recorded.
    pub fn fail_next_write(&self, err: OrderGatewayError) {
        lock(&self.state).fail_next_write = Some(err);
    }

    /// The next fetch (by id or number) fails once with `err`.
    pub fn fail_next_fetch(&self, err: OrderGatewayError) {
        lock(&self.state).fail_next_fetch = Some(err);
    }

    /// Every write pauses for `delay` before taking effect. Lets tests hold a command in flight deliberately.
    pub fn delay_writes(&self, delay: std::time::Duration) {
        lock(&self.state).write_delay = Some(delay);
    }

    async fn pause_for_write(&self) {
        let delay = lock(&self.state).write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn submitted_cancels(&self) -> Vec<(OrderId, CancelCommand)> {
        lock(&self.state).cancels.clone()
    }

    pub fn submitted_refunds(&self) -> Vec<(OrderId, RefundCommand)> {
        lock(&self.state).refunds.clone()
    }

    pub fn submitted_completions(&self) -> Vec<OrderId> {
        lock(&self.state).completions.clone()
    }

    pub fn policy_fetch_count(&self) -> u32 {
        lock(&self.state).policy_fetches
    }

    fn take_write_failure(state: &mut State) -> Option<OrderGatewayError> {
        state.fail_next_write.take()
    }

    fn order_mut<'a>(state: &'a mut State, id: &OrderId) -> Result<&'a mut Order, OrderGatewayError> {
        state.orders.get_mut(id).ok_or_else(|| OrderGatewayError::NotFound(id.clone()))
    }
}

impl OrderGateway for MemoryGateway {
    async fn fetch_order(&self, id: &OrderId) -> Result<Order, OrderGatewayError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.fail_next_fetch.take() {
            return Err(err);
        }
        state.orders.get(id).cloned().ok_or_else(|| OrderGatewayError::NotFound(id.clone()))
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Order, OrderGatewayError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.fail_next_fetch.take() {
            return Err(err);
        }
        state
            .orders
            .values()
            .find(|o| &o.order_number == number)
            .cloned()
            .ok_or_else(|| OrderGatewayError::NotFound(OrderId(number.0.clone())))
    }

    async fn fetch_orders_page(
        &self,
        viewer: &Viewer,
        page: u32,
        page_size: u32,
        _sort: Option<SortBy>,
    ) -> Result<Page<Order>, OrderGatewayError> {
        let state = lock(&self.state);
        let mut matching: Vec<Order> = state
            .orders
            .values()
            .filter(|o| match viewer {
                Viewer::Buyer => true,
                Viewer::Seller(seller) => o.items_for_seller(seller).next().is_some(),
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total_items = matching.len() as u64;
        let start = (page as usize) * (page_size as usize);
        let items = matching.into_iter().skip(start).take(page_size as usize).collect();
        Ok(Page { items, page, page_size, total_items })
    }

    async fn submit_cancel(&self, id: &OrderId, command: &CancelCommand) -> Result<(), OrderGatewayError> {
        self.pause_for_write().await;
        let mut state = lock(&self.state);
        if let Some(err) = Self::take_write_failure(&mut state) {
            return Err(err);
        }
        state.cancels.push((id.clone(), command.clone()));
        let order = Self::order_mut(&mut state, id)?;
        match &command.order_item_ids {
            None => {
                order.status = OrderStatus::Cancelled;
                for item in &mut order.items {
                    item.cancelled_quantity = item.quantity - item.refunded_quantity;
                }
            },
            Some(ids) => {
                for item in order.items.iter_mut().filter(|i| ids.contains(&i.id)) {
                    item.cancelled_quantity = item.quantity - item.refunded_quantity;
                }
            },
        }
        Ok(())
    }

    async fn submit_refund(&self, id: &OrderId, command: &RefundCommand) -> Result<(), OrderGatewayError> {
        self.pause_for_write().await;
        let mut state = lock(&self.state);
        if let Some(err) = Self::take_write_failure(&mut state) {
            return Err(err);
        }
        state.refunds.push((id.clone(), command.clone()));
        let order = Self::order_mut(&mut state, id)?;
        match &command.order_item_ids {
            None => {
                order.status = OrderStatus::Refunded;
                for item in &mut order.items {
                    item.refunded_quantity = item.quantity - item.cancelled_quantity;
                }
            },
            Some(ids) => {
                for item in order.items.iter_mut().filter(|i| ids.contains(&i.id)) {
                    item.refunded_quantity = item.quantity - item.cancelled_quantity;
                }
            },
        }
        Ok(())
    }

    async fn submit_complete(&self, id: &OrderId) -> Result<(), OrderGatewayError> {
        self.pause_for_write().await;
        let mut state = lock(&self.state);
        if let Some(err) = Self::take_write_failure(&mut state) {
            return Err(err);
        }
        state.completions.push(id.clone());
        let order = Self::order_mut(&mut state, id)?;
        order.status = OrderStatus::Completed;
        order.escrow_amount = Money::from(0);
        Ok(())
    }

    async fn update_name(&self, id: &OrderId, name: &str) -> Result<(), OrderGatewayError> {
        self.pause_for_write().await;
        let mut state = lock(&self.state);
        if let Some(err) = Self::take_write_failure(&mut state) {
            return Err(err);
        }
        Self::order_mut(&mut state, id)?.name = name.to_string();
        Ok(())
    }

    async fn update_notes(&self, id: &OrderId, notes: &str) -> Result<(), OrderGatewayError> {
        self.pause_for_write().await;
        let mut state = lock(&self.state);
        if let Some(err) = Self::take_write_failure(&mut state) {
            return Err(err);
        }
        Self::order_mut(&mut state, id)?.notes = Some(notes.to_string());
        Ok(())
    }

    async fn update_address(
        &self,
        id: &OrderId,
        shipping: &AddressId,
        billing: Option<&AddressId>,
    ) -> Result<(), OrderGatewayError> {
        self.pause_for_write().await;
        let mut state = lock(&self.state);
        if let Some(err) = Self::take_write_failure(&mut state) {
            return Err(err);
        }
        let order = Self::order_mut(&mut state, id)?;
        order.shipping_address_id = shipping.clone();
        order.billing_address_id = billing.cloned();
        Ok(())
    }

    async fn fetch_pending_escrow_amount(&self) -> Result<Money, OrderGatewayError> {
        Ok(lock(&self.state).pending_escrow)
    }

    async fn fetch_status_policy_config(&self) -> Result<StatusPolicyConfig, OrderGatewayError> {
        let mut state = lock(&self.state);
        state.policy_fetches += 1;
        Ok(state.policy_config.clone())
    }
}
