//!
//! Utility module for the vault client.
//!
//! Re-exports unit conversion helpers used by the snapshot and the transaction coordinator.
/// Decimal unit parsing and formatting
pub mod units;

pub use alloy_primitives::utils::Unit;
pub use units::{format_units, parse_units};
