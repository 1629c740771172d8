use alloy_primitives::Address;
use std::fmt;

/// The connected account together with the chain it is connected on.
///
/// Both halves always change together: the connection swaps the whole value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountIdentity {
	pub address: Address,
	pub chain_id: u64,
}

impl fmt::Display for AccountIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} on chain {}", self.address, self.chain_id)
	}
}

/// Identifier returned when registering a change handler, used to deregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(pub(crate) u64);
