//! Date arithmetic and display helpers.

pub mod dates;
pub mod format;

pub use dates::{month_bounds, next_month_start};
pub use format::{format_attainment, format_percent, truncate};
