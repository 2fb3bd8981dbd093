//! Display identifiers for generated work items.
//!
//! The formats are shared with downstream systems and must stay stable:
//! `REQ-YYYYMMDD-nnn`, `TRF-YYYYMMDD-nnn`, `ALERT-<epochMillis>-<rand>`.
//! The numeric suffixes are pseudo-random, not sequential; uniqueness is
//! enforced by the storage layer, and creators regenerate on conflict.

use chrono::Utc;
use rand::Rng;

/// Identifier for a replenishment request, e.g. `REQ-20250304-517`.
pub fn request_id() -> String {
    format!("REQ-{}-{}", Utc::now().format("%Y%m%d"), three_digits())
}

/// Identifier for a transfer order, e.g. `TRF-20250304-182`.
pub fn transfer_id() -> String {
    format!("TRF-{}-{}", Utc::now().format("%Y%m%d"), three_digits())
}

/// Identifier for a replenishment alert, e.g. `ALERT-1741045632000-421`.
pub fn alert_id() -> String {
    format!(
        "ALERT-{}-{}",
        Utc::now().timestamp_millis(),
        rand::thread_rng().gen_range(0..1000)
    )
}

fn three_digits() -> u32 {
    rand::thread_rng().gen_range(100..1000)
}
