//! Escrow auto-release timing.
//!
//! Once an order is delivered, the platform holds the buyer's funds for a fixed window (48 hours by default) before
//! releasing them to the seller automatically. The canonical release happens server-side; this module only computes
//! *when* release is expected, for display and for gating the buyer's manual "complete" accelerant.
//!
//! Everything here is a pure function of `(delivered_at, now)`. The view layer drives it from whatever clock it owns
//! (a 1-second display tick plus a slower revalidation poll); repeated calls recompute from scratch and can never
//! drift or double-count.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const DEFAULT_ESCROW_RELEASE_WINDOW: Duration = Duration::hours(48);

//--------------------------------------     EscrowWindow       ------------------------------------------------------
/// The derived state of the escrow countdown at a given instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowWindow {
    /// When the platform will auto-release the escrow. `None` until the order has a delivery timestamp.
    pub release_at: Option<DateTime<Utc>>,
    /// Time left before auto-release. `None` before delivery, zero at or after `release_at`.
    #[serde(
        rename = "remainingSeconds",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_duration_secs"
    )]
    pub remaining: Option<Duration>,
    pub is_expired: bool,
    /// How far through the window we are, clamped to `[0, 1]`. Monotonically non-decreasing in `now`.
    pub progress_ratio: f64,
}

fn serialize_duration_secs<S>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where S: serde::Serializer {
    match d {
        Some(d) => serializer.serialize_some(&d.num_seconds()),
        None => serializer.serialize_none(),
    }
}

impl EscrowWindow {
    /// The pre-delivery state: no deadline, not expired, no progress.
    pub fn pending() -> Self {
        Self { release_at: None, remaining: None, is_expired: false, progress_ratio: 0.0 }
    }

    pub fn remaining_time(&self) -> Option<RemainingTime> {
        self.remaining.map(RemainingTime::from)
    }
}

/// Compute the escrow window for an order delivered at `delivered_at`, as of `now`, with the default 48h release
/// window.
pub fn escrow_window(delivered_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> EscrowWindow {
    escrow_window_with(delivered_at, now, DEFAULT_ESCROW_RELEASE_WINDOW)
}

/// As [`escrow_window`], with an explicit release window (see [`crate::config::EngineConfig`]).
pub fn escrow_window_with(
    delivered_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> EscrowWindow {
    let Some(delivered_at) = delivered_at else {
        return EscrowWindow::pending();
    };
    let release_at = delivered_at + window;
    if now >= release_at {
        return EscrowWindow {
            release_at: Some(release_at),
            remaining: Some(Duration::zero()),
            is_expired: true,
            progress_ratio: 1.0,
        };
    }
    let remaining = release_at - now;
    let ratio = 1.0 - remaining.num_milliseconds() as f64 / window.num_milliseconds() as f64;
    EscrowWindow {
        release_at: Some(release_at),
        remaining: Some(remaining),
        is_expired: false,
        progress_ratio: ratio.clamp(0.0, 1.0),
    }
}

//--------------------------------------     RemainingTime      ------------------------------------------------------
/// A countdown decomposed into whole hours, minutes and seconds for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemainingTime {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl From<Duration> for RemainingTime {
    fn from(d: Duration) -> Self {
        let total = d.num_seconds().max(0);
        Self { hours: total / 3600, minutes: (total % 3600) / 60, seconds: total % 60 }
    }
}

impl std::fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}
