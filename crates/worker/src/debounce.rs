//! Trailing-edge debounce timer.
//!
//! Every [`Debouncer::trigger`] replaces the pending task and pushes the deadline
//! out by the configured delay. Once the delay passes with no new trigger, the
//! latest task runs exactly once. Triggers arriving while a task runs are
//! debounced again after it finishes, so tasks from one debouncer never overlap.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use vellum_primitives::BoxFutureStatic;

use crate::{TaskClass, spawn};

enum DebounceMsg {
	Schedule(BoxFutureStatic<()>),
	Cancel,
}

/// Coalesces bursts of triggers into a single task run after a quiet period.
#[derive(Debug)]
pub struct Debouncer {
	delay: Duration,
	tx: mpsc::UnboundedSender<DebounceMsg>,
	pending: Arc<AtomicBool>,
}

impl Debouncer {
	/// Creates a debouncer and spawns its timer task on the current runtime.
	pub fn new(delay: Duration) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let pending = Arc::new(AtomicBool::new(false));
		spawn(TaskClass::Interactive, run(delay, rx, Arc::clone(&pending)));
		Self { delay, tx, pending }
	}

	/// The quiet period before a task runs.
	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// Schedules `task`, replacing any task still waiting for its deadline.
	pub fn trigger<F>(&self, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.pending.store(true, Ordering::Release);
		if self.tx.send(DebounceMsg::Schedule(Box::pin(task))).is_err() {
			self.pending.store(false, Ordering::Release);
		}
	}

	/// Drops the waiting task, if any. A task already running is not interrupted.
	pub fn cancel(&self) {
		self.pending.store(false, Ordering::Release);
		let _ = self.tx.send(DebounceMsg::Cancel);
	}

	/// Returns true while a task waits for its deadline.
	pub fn is_pending(&self) -> bool {
		self.pending.load(Ordering::Acquire)
	}
}

async fn run(delay: Duration, mut rx: mpsc::UnboundedReceiver<DebounceMsg>, pending: Arc<AtomicBool>) {
	let mut task: Option<BoxFutureStatic<()>> = None;
	let sleep = tokio::time::sleep(delay);
	tokio::pin!(sleep);

	loop {
		tokio::select! {
			msg = rx.recv() => match msg {
				Some(DebounceMsg::Schedule(next)) => {
					task = Some(next);
					sleep.as_mut().reset(Instant::now() + delay);
				}
				Some(DebounceMsg::Cancel) => task = None,
				None => break,
			},
			() = &mut sleep, if task.is_some() => {
				if let Some(task) = task.take() {
					// Only clear the flag if nothing was re-triggered behind us.
					if rx.is_empty() {
						pending.store(false, Ordering::Release);
					}
					task.await;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use parking_lot::Mutex;

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn burst_runs_only_latest_task_once() {
		let debouncer = Debouncer::new(Duration::from_millis(100));
		let seen = Arc::new(Mutex::new(Vec::new()));

		for i in 0..5 {
			let seen = Arc::clone(&seen);
			debouncer.trigger(async move { seen.lock().push(i) });
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
		assert!(debouncer.is_pending());
		assert!(seen.lock().is_empty());

		tokio::time::sleep(Duration::from_millis(150)).await;
		assert_eq!(*seen.lock(), vec![4]);
		assert!(!debouncer.is_pending());
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_drops_waiting_task() {
		let debouncer = Debouncer::new(Duration::from_millis(50));
		let runs = Arc::new(AtomicUsize::new(0));

		let counter = Arc::clone(&runs);
		debouncer.trigger(async move {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		debouncer.cancel();
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert_eq!(runs.load(Ordering::SeqCst), 0);
		assert!(!debouncer.is_pending());
	}

	#[tokio::test(start_paused = true)]
	async fn separated_triggers_each_run() {
		let debouncer = Debouncer::new(Duration::from_millis(30));
		let runs = Arc::new(AtomicUsize::new(0));

		for _ in 0..3 {
			let counter = Arc::clone(&runs);
			debouncer.trigger(async move {
				counter.fetch_add(1, Ordering::SeqCst);
			});
			tokio::time::sleep(Duration::from_millis(100)).await;
		}

		assert_eq!(runs.load(Ordering::SeqCst), 3);
	}
}
