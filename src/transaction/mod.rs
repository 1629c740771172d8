//! User-initiated vault writes.
//!
//! - `amount`: validation of user-entered ether amounts.
//! - `pending`: the pending operation record and its lifecycle.
//! - `coordinator`: the `TransactionCoordinator`, which runs deposits and withdrawals one at a
//!   time and reports their outcome through the state store.

/// Amount validation
pub mod amount;
/// Single-flight write coordinator
pub mod coordinator;
/// Pending operation record
pub mod pending;

pub use amount::parse_amount;
pub use coordinator::TransactionCoordinator;
pub use pending::{OperationKind, OperationReceipt, OperationStatus, PendingOperation};
