use alloy_primitives::U256;
use alloy_primitives::utils::{ParseUnits, Unit};

/// Render `amount` (in wei) as an exact decimal in `unit`.
///
/// Trailing fractional zeros are trimmed, but at least one fractional digit is kept,
/// so one ether renders as `1.0`.
pub fn format_units(amount: U256, unit: Unit) -> String {
	let formatted = ParseUnits::from(amount).format_units(unit);
	match formatted.split_once('.') {
		Some((whole, fraction)) => {
			let fraction = fraction.trim_end_matches('0');
			let fraction = if fraction.is_empty() { "0" } else { fraction };
			format!("{}.{}", whole, fraction)
		}
		None => format!("{}.0", formatted),
	}
}

/// Parse a plain decimal string in `unit` into wei.
///
/// Accepts digits with an optional single `.` and at most as many fractional digits as `unit`
/// has decimals. Signs, exponents, separators and surrounding text are rejected before the
/// conversion, which would otherwise accept a sign or truncate extra digits.
pub fn parse_units(text: &str, unit: Unit) -> Result<U256, String> {
	let text = text.trim();
	if text.is_empty() {
		return Err("amount is empty".to_string());
	}
	if text.starts_with('-') {
		return Err(format!("'{}' is negative", text));
	}

	let (whole, fraction) = match text.split_once('.') {
		Some((whole, fraction)) => (whole, fraction),
		None => (text, ""),
	};
	let well_formed = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
	if !well_formed(whole)
		|| !well_formed(fraction)
		|| (whole.is_empty() && fraction.is_empty())
		|| text.ends_with('.')
	{
		return Err(format!("'{}' is not a decimal number", text));
	}
	if fraction.len() > unit.get() as usize {
		return Err(format!(
			"'{}' has more than {} decimal places",
			text,
			unit.get()
		));
	}

	let normalized = if whole.is_empty() {
		format!("0{}", text)
	} else {
		text.to_string()
	};
	alloy_primitives::utils::parse_units(&normalized, unit.get())
		.map(|parsed| parsed.get_absolute())
		.map_err(|e| format!("'{}' is out of range: {}", text, e))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_ether_and_gwei() {
		let one_ether = U256::from(10u64).pow(U256::from(18u64));
		assert_eq!(format_units(one_ether, Unit::ETHER), "1.0");
		assert_eq!(format_units(one_ether, Unit::GWEI), "1000000000.0");
		assert_eq!(format_units(U256::ZERO, Unit::ETHER), "0.0");
		assert_eq!(format_units(U256::from(1u64), Unit::ETHER), "0.000000000000000001");
		assert_eq!(
			format_units(U256::from(10_000_000_000_000_000u64), Unit::ETHER),
			"0.01"
		);
		assert_eq!(format_units(U256::from(1_500_000_000u64), Unit::GWEI), "1.5");
	}

	#[test]
	fn parses_decimal_amounts() {
		assert_eq!(
			parse_units("0.01", Unit::ETHER),
			Ok(U256::from(10_000_000_000_000_000u64))
		);
		assert_eq!(
			parse_units("2", Unit::ETHER),
			Ok(U256::from(2_000_000_000_000_000_000u64))
		);
		assert_eq!(parse_units(".5", Unit::GWEI), Ok(U256::from(500_000_000u64)));
		assert_eq!(parse_units(" 1.0 ", Unit::GWEI), Ok(U256::from(1_000_000_000u64)));
		assert_eq!(parse_units("0", Unit::ETHER), Ok(U256::ZERO));
		assert_eq!(parse_units("0.000", Unit::ETHER), Ok(U256::ZERO));
	}

	#[test]
	fn rejects_malformed_amounts() {
		for text in ["", "   ", "-1", "+1", "abc", "1.2.3", "1e18", "1,000", ".", "1.", "0x10"] {
			assert!(parse_units(text, Unit::ETHER).is_err(), "accepted {:?}", text);
		}
		assert!(parse_units("0.0000000001", Unit::GWEI).is_err());
		assert!(parse_units(&"9".repeat(80), Unit::ETHER).is_err());
	}
}
