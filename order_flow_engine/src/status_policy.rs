//! Data-driven classification of which order statuses permit cancel, refund and modify actions.
//!
//! The catalog service may override any of the three sets at runtime; whatever it does not supply falls back to the
//! built-in defaults. The merge is a pure function, so a stale or partial server config can never make the gates
//! panic — at worst an action is offered conservatively per the defaults.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::order_types::OrderStatus;

pub const DEFAULT_CANCELLABLE_STATUSES: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Confirmed];
pub const DEFAULT_REFUNDABLE_STATUSES: [OrderStatus; 1] = [OrderStatus::Delivered];
pub const DEFAULT_MODIFIABLE_STATUSES: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Confirmed];

//-----------------------------------     StatusPolicyConfig      ----------------------------------------------------
/// The raw, possibly partial policy configuration as served by the catalog service. Statuses are kept as strings so
/// that a server that has learned about statuses this client does not know yet still round-trips cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPolicyConfig {
    #[serde(default)]
    pub cancellable: Option<BTreeSet<String>>,
    #[serde(default)]
    pub refundable: Option<BTreeSet<String>>,
    #[serde(default)]
    pub modifiable: Option<BTreeSet<String>>,
}

impl StatusPolicyConfig {
    pub fn is_empty(&self) -> bool {
        self.cancellable.is_none() && self.refundable.is_none() && self.modifiable.is_none()
    }
}

//--------------------------------------     StatusPolicy       ------------------------------------------------------
/// The merged, total policy used for gating commands. Obtain one with [`StatusPolicy::merge`] (or
/// [`StatusPolicy::default`], which is the merge of an empty config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPolicy {
    cancellable: BTreeSet<String>,
    refundable: BTreeSet<String>,
    modifiable: BTreeSet<String>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::merge(&StatusPolicyConfig::default())
    }
}

fn default_set(statuses: &[OrderStatus]) -> BTreeSet<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

impl StatusPolicy {
    /// Merge a (possibly partial) server config over the built-in defaults. Each of the three sets is substituted
    /// independently: a config that only overrides `cancellable` keeps the default refundable and modifiable sets.
    pub fn merge(config: &StatusPolicyConfig) -> Self {
        Self {
            cancellable: config.cancellable.clone().unwrap_or_else(|| default_set(&DEFAULT_CANCELLABLE_STATUSES)),
            refundable: config.refundable.clone().unwrap_or_else(|| default_set(&DEFAULT_REFUNDABLE_STATUSES)),
            modifiable: config.modifiable.clone().unwrap_or_else(|| default_set(&DEFAULT_MODIFIABLE_STATUSES)),
        }
    }

    pub fn is_cancellable(&self, status: &OrderStatus) -> bool {
        self.cancellable.contains(status.as_str())
    }

    pub fn is_refundable(&self, status: &OrderStatus) -> bool {
        self.refundable.contains(status.as_str())
    }

    pub fn is_modifiable(&self, status: &OrderStatus) -> bool {
        self.modifiable.contains(status.as_str())
    }
}
