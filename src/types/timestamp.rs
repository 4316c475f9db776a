//! Wall-clock timestamps used on contracts and events.

use chrono::{DateTime, Utc};

/// All timestamps in the engine are UTC instants.
pub type Timestamp = DateTime<Utc>;

/// The current instant, as recorded by the engine.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
