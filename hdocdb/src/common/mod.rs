//! Values, constants and small shared types used across the engine.

mod constants;
mod numeric;
mod sort_order;
pub mod stream;
mod value;

pub use constants::*;
pub use numeric::Numeric;
pub use sort_order::SortOrder;
pub use value::{Value, ValueType};

/// Milliseconds since the unix epoch.
pub(crate) fn current_time_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
