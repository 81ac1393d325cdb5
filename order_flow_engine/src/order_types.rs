use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::error;
use ofe_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderNumber       ------------------------------------------------------
/// The human-facing order reference printed on invoices and quoted in support tickets. Distinct from [`OrderId`],
/// which is the backend's opaque identity.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl<S: Into<String>> From<S> for OrderNumber {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        ItemId          ------------------------------------------------------
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl<S: Into<String>> From<S> for ItemId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        SellerId        ------------------------------------------------------
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SellerId(pub String);

impl<S: Into<String>> From<S> for SellerId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for SellerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        AddressId       ------------------------------------------------------
/// Reference into the (external) address book. The engine never dereferences these.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(pub String);

impl<S: Into<String>> From<S> for AddressId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for AddressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Viewer          ------------------------------------------------------
/// Who is looking at an order. A closed union, matched exhaustively wherever role-dependent behaviour exists, so a
/// new role cannot be added without the compiler pointing at every projection that must handle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "role", content = "sellerId")]
pub enum Viewer {
    /// The buyer who placed the order. Sees everything, including notes and addresses.
    Buyer,
    /// A seller with items in the order. Sees only their own items and totals.
    Seller(SellerId),
}

impl Display for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Viewer::Buyer => write!(f, "buyer"),
            Viewer::Seller(id) => write!(f, "seller {id}"),
        }
    }
}

//--------------------------------------      OrderStatus       ------------------------------------------------------
/// The lifecycle status of an order.
///
/// The happy path advances monotonically `Pending → Confirmed → Processing → Shipped → Delivered → Completed`, with
/// early exits to `Cancelled` or `Refunded`. Statuses the backend adds in future deserialize as [`Unknown`], which
/// never satisfies any policy gate.
///
/// [`Unknown`]: OrderStatus::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created by checkout; payment not yet confirmed by the platform.
    Pending,
    /// Payment confirmed; the seller has not started preparing the order.
    Confirmed,
    /// The seller is preparing the order.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Delivery confirmed. This starts the escrow auto-release countdown.
    Delivered,
    /// Finalized, either manually by the buyer or by escrow auto-release. Terminal.
    Completed,
    /// Cancelled in full before delivery. Terminal.
    Cancelled,
    /// Refunded in full after delivery. Terminal.
    Refunded,
    /// A status this client version does not recognize. All policy gates treat it as ineligible.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
            OrderStatus::Unknown => "UNKNOWN",
        }
    }

    /// Terminal orders accept no further mutation from this engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(pub String);

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "PROCESSING" => Ok(Self::Processing),
            "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Unrecognized order status: {value}. Treating it as Unknown; no actions will be offered for it.");
            OrderStatus::Unknown
        })
    }
}

//--------------------------------------     PaymentStatus      ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Captured,
    PartiallyRefunded,
    Refunded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Authorized => write!(f, "AUTHORIZED"),
            PaymentStatus::Captured => write!(f, "CAPTURED"),
            PaymentStatus::PartiallyRefunded => write!(f, "PARTIALLY_REFUNDED"),
            PaymentStatus::Refunded => write!(f, "REFUNDED"),
            PaymentStatus::Failed => write!(f, "FAILED"),
            PaymentStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

//--------------------------------------       OrderItem        ------------------------------------------------------
/// A single line item of an order. Partial cancellations and refunds are tracked per item as quantities rather than
/// by splitting items, so `cancelled_quantity + refunded_quantity <= quantity` must hold at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: ItemId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    #[serde(default)]
    pub cancelled_quantity: u32,
    #[serde(default)]
    pub refunded_quantity: u32,
    pub seller_id: SellerId,
    #[serde(default)]
    pub campaign_name: Option<String>,
}

impl OrderItem {
    /// The item-level quantity invariant. The backend owns the bookkeeping; this is the client-side check that we
    /// have not been handed (or produced) inconsistent numbers. The sum is taken in `u64` so that hostile wire
    /// values cannot wrap it back into range.
    pub fn quantities_consistent(&self) -> bool {
        self.quantity > 0
            && u64::from(self.cancelled_quantity) + u64::from(self.refunded_quantity) <= u64::from(self.quantity)
    }

    /// Units that are still live, i.e. neither cancelled nor refunded.
    pub fn outstanding_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.cancelled_quantity.saturating_add(self.refunded_quantity))
    }
}

//--------------------------------------         Order          ------------------------------------------------------
/// The order aggregate as returned by the order backend. This is an immutable snapshot: the engine never mutates it
/// locally, it re-fetches after every successful command (see [`crate::OrderFlowApi`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub escrow_amount: Money,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub shipping_address_id: AddressId,
    #[serde(default)]
    pub billing_address_id: Option<AddressId>,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(|i| i.total_price).sum()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn item(&self, id: &ItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn items_for_seller<'a>(&'a self, seller: &'a SellerId) -> impl Iterator<Item = &'a OrderItem> {
        self.items.iter().filter(move |i| &i.seller_id == seller)
    }

    /// True when every line item satisfies its quantity invariant and the escrow balance is non-negative.
    pub fn invariants_hold(&self) -> bool {
        !self.escrow_amount.is_negative() && self.items.iter().all(OrderItem::quantities_consistent)
    }
}
