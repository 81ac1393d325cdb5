use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    commands::{select_items, validate_reason_text},
    errors::OrderFlowError,
    order_types::{ConversionError, ItemId, Order},
    status_policy::StatusPolicy,
};

//--------------------------------------     CancelReason       ------------------------------------------------------
/// The buyer's stated reason for cancelling. The backend only accepts these codes; free text goes in the separate
/// `reason_text` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    ChangedMind,
    FoundBetterPrice,
    DeliveryTooSlow,
    OrderedByMistake,
    SellerRequest,
    Other,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::ChangedMind => write!(f, "CHANGED_MIND"),
            CancelReason::FoundBetterPrice => write!(f, "FOUND_BETTER_PRICE"),
            CancelReason::DeliveryTooSlow => write!(f, "DELIVERY_TOO_SLOW"),
            CancelReason::OrderedByMistake => write!(f, "ORDERED_BY_MISTAKE"),
            CancelReason::SellerRequest => write!(f, "SELLER_REQUEST"),
            CancelReason::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for CancelReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHANGED_MIND" => Ok(Self::ChangedMind),
            "FOUND_BETTER_PRICE" => Ok(Self::FoundBetterPrice),
            "DELIVERY_TOO_SLOW" => Ok(Self::DeliveryTooSlow),
            "ORDERED_BY_MISTAKE" => Ok(Self::OrderedByMistake),
            "SELLER_REQUEST" => Ok(Self::SellerRequest),
            "OTHER" => Ok(Self::Other),
            s => Err(ConversionError(format!("Invalid cancel reason: {s}"))),
        }
    }
}

//--------------------------------------     CancelCommand      ------------------------------------------------------
/// A validated cancellation, ready for [`crate::traits::OrderGateway::submit_cancel`].
/// `order_item_ids = None` cancels the whole order; a non-empty list cancels only those items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelCommand {
    pub reason: CancelReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_item_ids: Option<Vec<ItemId>>,
}

/// Validate and shape a cancellation command against the order's current snapshot.
///
/// Fails with [`OrderFlowError::StateIneligible`] when the policy gate is closed, before anything else is checked,
/// so an ineligible order never reaches reason/selection validation (and never the network).
pub fn build_cancel_request(
    order: &Order,
    policy: &StatusPolicy,
    reason: CancelReason,
    reason_text: Option<&str>,
    selected_items: Option<&[ItemId]>,
) -> Result<CancelCommand, OrderFlowError> {
    if !policy.is_cancellable(&order.status) {
        return Err(OrderFlowError::StateIneligible { action: "cancel", status: order.status });
    }
    let reason_text = validate_reason_text(reason_text)?;
    let order_item_ids = select_items(order, selected_items)?;
    Ok(CancelCommand { reason, reason_text, order_item_ids })
}
