//! Balance Synchronization Module
//!
//! This module keeps the balance snapshot in step with the chain. It is composed of several
//! submodules, each responsible for a specific aspect of the sync process:
//!
//! - `engine`: The coalescing refresh engine. It owns the binding to the connected account and
//!   turns any number of triggers into the smallest number of balance fetches.
//! - `events`: Defines the trigger types every change source is reduced to.
//! - `progress_tracker`: Tracks triggers and fetch outcomes and provides statistics.
//! - `snapshot`: The immutable balance snapshot and its merge rule for partial failures.
//! - `state`: The observable state store shared with the transaction coordinator.

/// Coalescing refresh engine
pub mod engine;
/// Trigger types
pub mod events;
/// Tracks refresh activity and statistics
pub mod progress_tracker;
/// Balance snapshot
pub mod snapshot;
/// Observable application state
pub mod state;

pub use engine::{SyncConfig, SyncEngine, SyncHandle};
pub use events::{SyncTrigger, TriggerKind};
pub use progress_tracker::RefreshStats;
pub use snapshot::{BalanceField, BalanceSnapshot, NativeAmount};
pub use state::{StateStore, StatusMessage, StatusSource, SyncState, VaultState};
