use crate::error::VaultError;
use crate::utils::{Unit, parse_units};

use alloy_primitives::U256;

/// Validate a user-entered ether amount and convert it to wei.
///
/// Runs before anything touches the network: empty, zero, negative and non-numeric input is
/// rejected here.
pub fn parse_amount(text: &str) -> Result<U256, VaultError> {
	let amount = parse_units(text, Unit::ETHER).map_err(VaultError::InvalidAmount)?;
	if amount.is_zero() {
		return Err(VaultError::InvalidAmount(format!(
			"'{}' must be greater than zero",
			text.trim()
		)));
	}
	Ok(amount)
}
