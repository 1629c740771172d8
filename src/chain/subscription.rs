//! Scoped subscription handles.
//!
//! Every long-lived listener in the crate (block heads, vault logs, wallet change polling) runs
//! as a Tokio task owned by a `SubscriptionGuard`. Dropping the guard, or calling
//! `unsubscribe`, aborts the task, so releasing a binding releases all of its listeners.

use crate::chain::SubscriptionStream;
use crate::rpc::RpcError;

use backoff::{ExponentialBackoff, future::retry};
use futures_util::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Pause before re-opening a stream that ended cleanly.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Owns a listener task and aborts it when released.
#[derive(Debug)]
pub struct SubscriptionGuard {
	name: &'static str,
	handle: Option<JoinHandle<()>>,
}

impl SubscriptionGuard {
	/// Spawn `task` on the current runtime and tie its lifetime to the returned guard.
	pub fn spawn<F>(name: &'static str, task: F) -> Self
	where
		F: Future<Output = ()> + Send + 'static,
	{
		debug!("Starting subscription {}", name);
		Self {
			name,
			handle: Some(tokio::spawn(task)),
		}
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Whether the listener task is still running
	pub fn is_active(&self) -> bool {
		self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
	}

	/// Stop the listener now.
	pub fn unsubscribe(mut self) {
		self.release();
	}

	fn release(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
			debug!("Released subscription {}", self.name);
		}
	}
}

impl Drop for SubscriptionGuard {
	fn drop(&mut self) {
		self.release();
	}
}

/// Keep a node subscription alive for as long as the returned guard lives.
///
/// `subscribe` opens the stream; failures to open it are retried with exponential backoff, and
/// when an open stream errors or ends the subscription is re-established. Every item is handed
/// to `on_item` on the listener task.
pub fn spawn_resubscribing<T, S, Fut, H>(
	name: &'static str,
	subscribe: S,
	mut on_item: H,
) -> SubscriptionGuard
where
	T: Send + 'static,
	S: Fn() -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<SubscriptionStream<T>, RpcError>> + Send + 'static,
	H: FnMut(T) + Send + 'static,
{
	SubscriptionGuard::spawn(name, async move {
		loop {
			let policy = ExponentialBackoff {
				max_elapsed_time: None,
				..ExponentialBackoff::default()
			};
			let opened = retry(policy, || {
				let attempt = subscribe();
				async move {
					attempt.await.map_err(|e| {
						warn!("Failed to open {} subscription: {}", name, e);
						backoff::Error::transient(e)
					})
				}
			})
			.await;

			let mut stream = match opened {
				Ok(stream) => stream,
				Err(e) => {
					error!("Giving up on {} subscription: {}", name, e);
					return;
				}
			};

			while let Some(item) = stream.next().await {
				match item {
					Ok(item) => on_item(item),
					Err(e) => {
						warn!("{} subscription failed: {}", name, e);
						break;
					}
				}
			}

			debug!("{} subscription ended, resubscribing", name);
			tokio::time::sleep(RESUBSCRIBE_DELAY).await;
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[tokio::test]
	async fn dropping_the_guard_stops_the_task() {
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
		let guard = SubscriptionGuard::spawn("test", async move {
			let _tx = tx;
			std::future::pending::<()>().await;
		});
		assert!(guard.is_active());
		drop(guard);
		// The sender lives inside the aborted task, so the channel closes.
		assert!(rx.recv().await.is_none());
	}

	#[tokio::test]
	async fn unsubscribe_stops_the_task() {
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
		let guard = SubscriptionGuard::spawn("test", async move {
			let _tx = tx;
			std::future::pending::<()>().await;
		});
		guard.unsubscribe();
		assert!(rx.recv().await.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn resubscribes_after_open_failure() {
		let attempts = Arc::new(AtomicUsize::new(0));
		let (items_tx, mut items_rx) = tokio::sync::mpsc::unbounded_channel();

		let counter = attempts.clone();
		let _guard = spawn_resubscribing(
			"flaky",
			move || {
				let counter = counter.clone();
				async move {
					if counter.fetch_add(1, Ordering::SeqCst) == 0 {
						return Err(RpcError::SubscriptionError("refused".to_string()));
					}
					let stream: SubscriptionStream<u64> =
						Box::pin(futures_util::stream::iter(vec![Ok(7u64)]).chain(futures_util::stream::pending()));
					Ok(stream)
				}
			},
			move |item| {
				let _ = items_tx.send(item);
			},
		);

		assert_eq!(items_rx.recv().await, Some(7));
		assert_eq!(attempts.load(Ordering::SeqCst), 2);
	}
}
