use std::collections::BTreeSet;

use crate::{
    errors::OrderFlowError,
    order_types::{ItemId, Order},
};

/// Validate a caller-selected subset of an order's items and normalize it into the wire payload shape.
///
/// `None` (or a selection covering every item) means "apply to the whole order" and normalizes to `Ok(None)` — the
/// backend treats a full-order request differently from an itemized one, so an explicit all-items list must not be
/// sent. An explicit empty selection is a validation error, as is any id that does not belong to the order.
/// Duplicate ids are collapsed before the full-cover comparison.
pub fn select_items(order: &Order, selected: Option<&[ItemId]>) -> Result<Option<Vec<ItemId>>, OrderFlowError> {
    let Some(selected) = selected else {
        return Ok(None);
    };
    if selected.is_empty() {
        return Err(OrderFlowError::Validation("select at least one item".to_string()));
    }
    let unique: BTreeSet<&ItemId> = selected.iter().collect();
    for id in &unique {
        if order.item(id).is_none() {
            return Err(OrderFlowError::Validation(format!("item {id} does not belong to order {}", order.id)));
        }
    }
    if unique.len() == order.items.len() {
        // Selecting every item is a full-order request.
        return Ok(None);
    }
    // Preserve the caller's ordering, minus duplicates.
    let mut seen = BTreeSet::new();
    let ids = selected.iter().filter(|id| seen.insert(*id)).cloned().collect();
    Ok(Some(ids))
}
