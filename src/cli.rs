use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Keep a vault's balances in sync and drive deposits and withdrawals", long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
	/// Log this crate at debug level
	#[clap(long, short = 'v', global = true)]
	pub verbose: bool,
	#[clap(subcommand)]
	pub sub_command: SubCommand,
}

impl Cli {
	pub fn init() -> Self {
		Self::parse()
	}
}

#[derive(Subcommand, Debug)]
pub enum SubCommand {
	/// Follow the balances until interrupted
	Watch,
	/// Refresh once and print the balances
	Balance,
	/// Deposit an amount of ether into the vault
	Deposit { amount: String },
	/// Withdraw an amount of ether from the vault
	Withdraw { amount: String },
	/// Withdraw the whole vault balance
	WithdrawAll,
}
