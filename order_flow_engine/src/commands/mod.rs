//! Validation and shaping of the user-initiated order commands.
//!
//! Builders in this module never mutate local state and never touch the network. They take the last-read order
//! snapshot, check the status policy gate, validate the reason and item selection, and produce a command value ready
//! for [`crate::traits::OrderGateway`]. Applying the command and re-fetching the order afterwards is the job of
//! [`crate::ofe_api::OrderFlowApi`].

mod cancel;
mod refund;
mod selection;

pub use cancel::{build_cancel_request, CancelCommand, CancelReason};
pub use refund::{build_refund_request, RefundCommand, RefundReason};
pub use selection::select_items;

pub(crate) const MAX_REASON_TEXT_LEN: usize = 1000;

pub(crate) fn validate_reason_text(text: Option<&str>) -> Result<Option<String>, crate::errors::OrderFlowError> {
    let Some(text) = text else {
        return Ok(None);
    };
    let len = text.chars().count();
    if len > MAX_REASON_TEXT_LEN {
        return Err(crate::errors::OrderFlowError::Validation(format!(
            "reason text is too long ({len} characters, maximum {MAX_REASON_TEXT_LEN})"
        )));
    }
    Ok(Some(text.to_string()))
}
