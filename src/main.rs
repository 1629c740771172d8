mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use vault_state_sync::chain::{ChainProvider, NodeWallet};
use vault_state_sync::rpc::JsonRpcClient;
use vault_state_sync::sync::VaultState;
use vault_state_sync::transaction::OperationReceipt;
use vault_state_sync::{ServiceConfig, VaultConfig, VaultError, VaultSyncService};

use crate::cli::{Cli, SubCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	dotenv::dotenv().ok();
	let cli = Cli::init();

	// Initialize tracing subscriber, with this crate at debug level when asked for
	let crate_level = if cli.verbose { "debug" } else { "info" };
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into())
				.add_directive(
					format!("vault_state_sync={}", crate_level)
						.parse()
						.unwrap_or_else(|_| tracing::Level::INFO.into()),
				),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting vault sync");

	let config = match VaultConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			return ExitCode::from(2);
		}
	};

	let client = match JsonRpcClient::new(config.rpc_url.clone(), config.ws_url.clone()) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create node client: {}", e);
			return ExitCode::FAILURE;
		}
	};

	match client.chain_id().await {
		Ok(chain_id) if chain_id != config.chain_id => warn!(
			"Node reports chain {}, but chain {} is required",
			chain_id, config.chain_id
		),
		Ok(chain_id) => info!("Node is on chain {}", chain_id),
		Err(e) => warn!("Could not read the node's chain id: {}", e),
	}

	let wallet = Arc::new(NodeWallet::new(client.clone()));
	let _poller = wallet.spawn_change_poller(config.wallet_poll_interval);

	let service = VaultSyncService::start(
		Arc::new(client),
		Some(wallet),
		ServiceConfig::from(&config),
	);

	if let Err(e) = service.connect().await {
		error!("Failed to connect wallet: {}", e);
		service.shutdown().await;
		return ExitCode::FAILURE;
	}

	let outcome = match cli.sub_command {
		SubCommand::Watch => {
			watch(&service).await;
			Ok(())
		}
		SubCommand::Balance => Ok(()),
		SubCommand::Deposit { amount } => service.deposit(&amount).await.map(report),
		SubCommand::Withdraw { amount } => service.withdraw(&amount).await.map(report),
		SubCommand::WithdrawAll => service.withdraw_all().await.map(report),
	};

	let state = service.refresh_and_wait().await;
	print_state(&state);
	service.shutdown().await;

	match outcome {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("{}", e);
			exit_code(&e)
		}
	}
}

/// Log every state change until ctrl-c.
async fn watch(service: &VaultSyncService) {
	let mut updates = service.subscribe();
	service.refresh();

	loop {
		tokio::select! {
			changed = updates.changed() => {
				if changed.is_err() {
					break;
				}
				let state = updates.borrow_and_update().clone();
				print_state(&state);
			}
			_ = tokio::signal::ctrl_c() => {
				info!("Interrupted, shutting down");
				break;
			}
		}
	}
}

fn report(receipt: OperationReceipt) {
	info!(
		"{} confirmed: {} (block {})",
		receipt.kind,
		receipt.submission,
		receipt
			.block_number
			.map(|number| number.to_string())
			.unwrap_or_else(|| "unknown".to_string())
	);
}

fn print_state(state: &VaultState) {
	match state.identity {
		Some(identity) => info!("Account: {}", identity),
		None => info!("Account: not connected"),
	}
	info!("Balances: {}", state.snapshot);
	if let Some(pending) = &state.pending {
		info!("Pending: {} ({:?})", pending.kind, pending.status);
	}
	if let Some(status) = state.status_text() {
		info!("Status: {}", status);
	}
	info!("Sync: {:?}, {}", state.sync_state, state.refresh.summary());
}

fn exit_code(error: &VaultError) -> ExitCode {
	match error {
		VaultError::InvalidAmount(_) => ExitCode::from(2),
		_ => ExitCode::FAILURE,
	}
}
