//! Contract bindings for the vault.
//!
//! The four calls and two events are declared once with `sol!`; calldata, return values and logs
//! go through the generated types.

use crate::error::VaultError;
use crate::rpc::Log;
use crate::vault::VaultEvent;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent, sol};

sol! {
	function balanceOf(address user) external view returns (uint256);
	function deposit() external payable;
	function withdraw(uint256 amount) external;
	function withdrawAll() external;

	event Deposited(address indexed user, uint256 amount);
	event Withdrew(address indexed user, uint256 amount);
}

pub fn encode_balance_of(owner: Address) -> Bytes {
	balanceOfCall { user: owner }.abi_encode().into()
}

pub fn encode_deposit() -> Bytes {
	depositCall {}.abi_encode().into()
}

pub fn encode_withdraw(amount: U256) -> Bytes {
	withdrawCall { amount }.abi_encode().into()
}

pub fn encode_withdraw_all() -> Bytes {
	withdrawAllCall {}.abi_encode().into()
}

/// Decode the `balanceOf` return value.
///
/// Calls that revert or hit an address without code come back empty.
pub fn decode_balance_of(data: &[u8]) -> Result<U256, VaultError> {
	balanceOfCall::abi_decode_returns(data, false)
		.map(|returns| returns._0)
		.map_err(|e| {
			VaultError::ContractReverted(format!(
				"undecodable balanceOf return ({} bytes): {}",
				data.len(),
				e
			))
		})
}

/// Decode a `Deposited` or `Withdrew` log. Returns `None` for anything else.
pub fn decode_event(log: &Log) -> Option<VaultEvent> {
	let topics = log.topics.iter().copied();
	match log.topics.first()? {
		topic if *topic == Deposited::SIGNATURE_HASH => {
			let event = Deposited::decode_raw_log(topics, &log.data, false).ok()?;
			Some(VaultEvent::Deposited {
				depositor: event.user,
				amount: event.amount,
			})
		}
		topic if *topic == Withdrew::SIGNATURE_HASH => {
			let event = Withdrew::decode_raw_log(topics, &log.data, false).ok()?;
			Some(VaultEvent::Withdrew {
				depositor: event.user,
				amount: event.amount,
			})
		}
		_ => None,
	}
}
