use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::*;
use ofe_common::Money;

use crate::{
    commands::{build_cancel_request, build_refund_request, CancelReason, RefundReason},
    config::EngineConfig,
    errors::OrderFlowError,
    ofe_api::order_views::{project, OrderView},
    order_types::{AddressId, ItemId, Order, OrderId, OrderNumber, Viewer},
    status_policy::StatusPolicy,
    traits::{OrderGateway, OrderGatewayError, Page, SortBy},
};

/// `OrderFlowApi` orchestrates every user-initiated order command — cancel, refund, complete, rename, re-address,
/// edit notes — against the status policy gates, and keeps the read side honest by re-fetching the order after every
/// successful write.
///
/// Commands on the same order are strictly serialized: a second command issued while one is in flight fails fast
/// with [`OrderFlowError::CommandInFlight`] and never reaches the gateway. The engine never mutates an order
/// snapshot locally; the last gateway response is the sole source of truth, because partial cancel/refund quantity
/// bookkeeping happens server-side and any local guess could silently diverge.
pub struct OrderFlowApi<B> {
    gateway: B,
    config: EngineConfig,
    policy_cache: Mutex<PolicyCache>,
    in_flight: Arc<Mutex<HashSet<OrderId>>>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

#[derive(Debug)]
struct PolicyCache {
    policy: StatusPolicy,
    fetched_at: Option<DateTime<Utc>>,
}

/// Poisoning only happens if a panic escaped while the lock was held; the sets we guard stay consistent either way,
/// so recover the inner value rather than propagating the panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes the order id from the in-flight set when the command settles, on every path out of the command body.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<OrderId>>>,
    id: OrderId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.id);
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(gateway: B) -> Self {
        Self::with_config(gateway, EngineConfig::default())
    }

    pub fn with_config(gateway: B, config: EngineConfig) -> Self {
        Self {
            gateway,
            config,
            policy_cache: Mutex::new(PolicyCache { policy: StatusPolicy::default(), fetched_at: None }),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn gateway(&self) -> &B {
        &self.gateway
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn begin_command(&self, id: &OrderId) -> Result<InFlightGuard, OrderFlowError> {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.insert(id.clone()) {
            return Err(OrderFlowError::CommandInFlight(id.clone()));
        }
        drop(in_flight);
        Ok(InFlightGuard { set: Arc::clone(&self.in_flight), id: id.clone() })
    }
}

impl<B> OrderFlowApi<B>
where B: OrderGateway
{
    //----------------------------------------    Policy    ----------------------------------------------------------

    /// The current status policy: the server's configured sets merged over the built-in defaults, cached for
    /// `config.policy_ttl`. A failed refresh is logged and the last known policy (or the defaults) is served —
    /// reads never fail because the policy endpoint is down.
    pub async fn policy(&self) -> StatusPolicy {
        let needs_refresh = {
            let cache = lock(&self.policy_cache);
            match cache.fetched_at {
                None => true,
                Some(at) => Utc::now() - at >= self.config.policy_ttl,
            }
        };
        if needs_refresh {
            match self.gateway.fetch_status_policy_config().await {
                Ok(config) => {
                    trace!("🛡️ Status policy config refreshed (empty: {})", config.is_empty());
                    let mut cache = lock(&self.policy_cache);
                    cache.policy = StatusPolicy::merge(&config);
                    cache.fetched_at = Some(Utc::now());
                },
                Err(e) => {
                    warn!("🛡️ Could not refresh the status policy config: {e}. Serving the last known policy.");
                },
            }
        }
        lock(&self.policy_cache).policy.clone()
    }

    //----------------------------------------     Reads    ----------------------------------------------------------

    pub async fn order(&self, id: &OrderId) -> Result<Order, OrderFlowError> {
        self.gateway.fetch_order(id).await.map_err(|e| OrderFlowError::from_gateway(e, id))
    }

    pub async fn order_by_number(&self, number: &OrderNumber) -> Result<Order, OrderFlowError> {
        Ok(self.gateway.fetch_order_by_number(number).await?)
    }

    pub async fn orders_page(
        &self,
        viewer: &Viewer,
        page: u32,
        page_size: u32,
        sort: Option<SortBy>,
    ) -> Result<Page<Order>, OrderFlowError> {
        Ok(self.gateway.fetch_orders_page(viewer, page, page_size, sort).await?)
    }

    /// The aggregate amount currently held in escrow for the viewer. Driven by the caller's revalidation poll.
    pub async fn pending_escrow(&self) -> Result<Money, OrderFlowError> {
        let amount = self.gateway.fetch_pending_escrow_amount().await?;
        if amount.is_negative() {
            warn!("⏳️ Backend reported a negative pending escrow amount ({amount}).");
        }
        Ok(amount)
    }

    /// Project an order snapshot for the given viewer as of `now`, under the current status policy. Pure apart from
    /// the policy read; safe to call on every display tick.
    pub async fn view(&self, order: &Order, viewer: &Viewer, now: DateTime<Utc>) -> OrderView {
        let policy = self.policy().await;
        project(order, viewer, &policy, now, self.config.escrow_release_window)
    }

    //----------------------------------------   Commands   ----------------------------------------------------------

    /// Cancel the whole order (`selected_items = None`) or only the selected items. The order must be in a
    /// cancellable status; on success the freshly re-fetched order is returned — the client never guesses whether
    /// the server cancelled in full or marked items individually.
    pub async fn cancel(
        &self,
        order: &Order,
        reason: CancelReason,
        reason_text: Option<&str>,
        selected_items: Option<&[ItemId]>,
    ) -> Result<Order, OrderFlowError> {
        let _guard = self.begin_command(&order.id)?;
        let policy = self.policy().await;
        let command = build_cancel_request(order, &policy, reason, reason_text, selected_items)?;
        debug!("📦️ Submitting cancellation for order {} ({:?} items)", order.id, command.order_item_ids);
        let result = self.gateway.submit_cancel(&order.id, &command).await;
        self.settle_write("cancel", &order.id, result).await
    }

    /// Request a refund for the whole order or the selected items. Only meaningful once goods are delivered; the
    /// default refundable set enforces that even when the backend policy config is stale.
    pub async fn refund(
        &self,
        order: &Order,
        reason: RefundReason,
        reason_text: Option<&str>,
        selected_items: Option<&[ItemId]>,
    ) -> Result<Order, OrderFlowError> {
        let _guard = self.begin_command(&order.id)?;
        let policy = self.policy().await;
        let command = build_refund_request(order, &policy, reason, reason_text, selected_items)?;
        debug!("📦️ Submitting refund request for order {} ({:?} items)", order.id, command.order_item_ids);
        let result = self.gateway.submit_refund(&order.id, &command).await;
        self.settle_write("refund", &order.id, result).await
    }

    /// Finalize a delivered order immediately instead of waiting out the escrow auto-release window. Shares the
    /// refund eligibility gate: completion exists exactly while a refund is still possible.
    pub async fn complete(&self, order: &Order) -> Result<Order, OrderFlowError> {
        let _guard = self.begin_command(&order.id)?;
        let policy = self.policy().await;
        if !policy.is_refundable(&order.status) {
            return Err(OrderFlowError::StateIneligible { action: "complete", status: order.status });
        }
        debug!("📦️ Requesting immediate completion of order {}", order.id);
        let result = self.gateway.submit_complete(&order.id).await;
        self.settle_write("complete", &order.id, result).await
    }

    /// Rename the order (a buyer-facing label, not the backend identity). Local edit buffers stay with the caller;
    /// only a successful save mutates anything, and even then the engine re-reads rather than patching.
    pub async fn rename(&self, order: &Order, name: &str) -> Result<Order, OrderFlowError> {
        let _guard = self.begin_command(&order.id)?;
        let policy = self.policy().await;
        if !policy.is_modifiable(&order.status) {
            return Err(OrderFlowError::StateIneligible { action: "rename", status: order.status });
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(OrderFlowError::Validation("order name cannot be empty".to_string()));
        }
        if name.chars().count() > self.config.max_name_len {
            return Err(OrderFlowError::Validation(format!(
                "order name is too long (maximum {} characters)",
                self.config.max_name_len
            )));
        }
        let result = self.gateway.update_name(&order.id, name).await;
        self.settle_write("rename", &order.id, result).await
    }

    pub async fn edit_notes(&self, order: &Order, notes: &str) -> Result<Order, OrderFlowError> {
        let _guard = self.begin_command(&order.id)?;
        let policy = self.policy().await;
        if !policy.is_modifiable(&order.status) {
            return Err(OrderFlowError::StateIneligible { action: "edit notes on", status: order.status });
        }
        if notes.chars().count() > self.config.max_notes_len {
            return Err(OrderFlowError::Validation(format!(
                "notes are too long (maximum {} characters)",
                self.config.max_notes_len
            )));
        }
        let result = self.gateway.update_notes(&order.id, notes).await;
        self.settle_write("edit notes on", &order.id, result).await
    }

    pub async fn edit_address(
        &self,
        order: &Order,
        shipping: &AddressId,
        billing: Option<&AddressId>,
    ) -> Result<Order, OrderFlowError> {
        let _guard = self.begin_command(&order.id)?;
        let policy = self.policy().await;
        if !policy.is_modifiable(&order.status) {
            return Err(OrderFlowError::StateIneligible { action: "re-address", status: order.status });
        }
        let result = self.gateway.update_address(&order.id, shipping, billing).await;
        self.settle_write("re-address", &order.id, result).await
    }

    /// Shared refetch-after-write discipline. On success the fresh snapshot is returned; on a state conflict the
    /// mandatory refetch still happens and its result rides along in the error so the UI can re-evaluate its gates
    /// against fresh truth. Writes are never retried here.
    async fn settle_write(
        &self,
        action: &'static str,
        id: &OrderId,
        result: Result<(), OrderGatewayError>,
    ) -> Result<Order, OrderFlowError> {
        match result {
            Ok(()) => {
                let fresh = self.gateway.fetch_order(id).await.map_err(|e| OrderFlowError::from_gateway(e, id))?;
                debug!("📦️ Order {} re-fetched after {action}; status is now {}", fresh.id, fresh.status);
                if !fresh.invariants_hold() {
                    warn!("📦️ Order {} violates its quantity invariants after {action}.", fresh.id);
                }
                Ok(fresh)
            },
            Err(OrderGatewayError::Conflict(msg)) => {
                warn!("📦️⚔️ The server rejected {action} for order {id}: {msg}");
                let latest = self.gateway.fetch_order(id).await.ok().map(Box::new);
                Err(OrderFlowError::StateConflict { id: id.clone(), latest })
            },
            Err(e) => Err(OrderFlowError::from_gateway(e, id)),
        }
    }
}
