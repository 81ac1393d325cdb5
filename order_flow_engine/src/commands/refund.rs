use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    commands::{select_items, validate_reason_text},
    errors::OrderFlowError,
    order_types::{ConversionError, ItemId, Order},
    status_policy::StatusPolicy,
};

//--------------------------------------     RefundReason       ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundReason {
    DamagedInTransit,
    NotAsDescribed,
    WrongItemDelivered,
    Defective,
    MissingParts,
    Other,
}

impl Display for RefundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundReason::DamagedInTransit => write!(f, "DAMAGED_IN_TRANSIT"),
            RefundReason::NotAsDescribed => write!(f, "NOT_AS_DESCRIBED"),
            RefundReason::WrongItemDelivered => write!(f, "WRONG_ITEM_DELIVERED"),
            RefundReason::Defective => write!(f, "DEFECTIVE"),
            RefundReason::MissingParts => write!(f, "MISSING_PARTS"),
            RefundReason::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for RefundReason {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAMAGED_IN_TRANSIT" => Ok(Self::DamagedInTransit),
            "NOT_AS_DESCRIBED" => Ok(Self::NotAsDescribed),
            "WRONG_ITEM_DELIVERED" => Ok(Self::WrongItemDelivered),
            "DEFECTIVE" => Ok(Self::Defective),
            "MISSING_PARTS" => Ok(Self::MissingParts),
            "OTHER" => Ok(Self::Other),
            s => Err(ConversionError(format!("Invalid refund reason: {s}"))),
        }
    }
}

//--------------------------------------     RefundCommand      ------------------------------------------------------
/// A validated refund request, ready for [`crate::traits::OrderGateway::submit_refund`]. Same selection semantics as
/// [`crate::commands::CancelCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundCommand {
    pub reason: RefundReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_item_ids: Option<Vec<ItemId>>,
}

/// Validate and shape a refund request against the order's current snapshot.
///
/// Gated by `is_refundable`: refunds are only meaningful once goods are delivered, and the built-in fallback set
/// (`{DELIVERED}`) enforces that even when the server's policy config is stale or absent.
pub fn build_refund_request(
    order: &Order,
    policy: &StatusPolicy,
    reason: RefundReason,
    reason_text: Option<&str>,
    selected_items: Option<&[ItemId]>,
) -> Result<RefundCommand, OrderFlowError> {
    if !policy.is_refundable(&order.status) {
        return Err(OrderFlowError::StateIneligible { action: "refund", status: order.status });
    }
    let reason_text = validate_reason_text(reason_text)?;
    let order_item_ids = select_items(order, selected_items)?;
    Ok(RefundCommand { reason, reason_text, order_item_ids })
}
