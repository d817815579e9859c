//! Serialized operation queue.
//!
//! Operations are served strictly in enqueue order and never overlap: the drain
//! task awaits one processor to completion before dequeuing the next. Callers
//! await the outcome of their own operation.
//!
//! [`OperationQueue::clear`] rejects every queued operation and the in-flight one
//! with [`QueueError::Cleared`]. The in-flight processor future is dropped at its
//! next suspension point.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use vellum_primitives::BoxFutureStatic;

use crate::{TaskClass, spawn};


/// Failure of a queued operation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError<E> {
	/// The queue was cleared before or while the operation ran.
	#[error("queue cleared")]
	Cleared,
	/// The drain task is gone.
	#[error("operation queue closed")]
	Closed,
	/// The operation's processor failed.
	#[error("{0}")]
	Failed(E),
}

impl<E> QueueError<E> {
	/// Returns the processor error, if this is one.
	pub fn into_failed(self) -> Option<E> {
		match self {
			Self::Failed(err) => Some(err),
			Self::Cleared | Self::Closed => None,
		}
	}
}

struct Job<T, E> {
	id: u64,
	generation: u64,
	label: &'static str,
	processor: BoxFutureStatic<Result<T, E>>,
	reply: oneshot::Sender<Result<T, QueueError<E>>>,
}

struct Shared {
	name: &'static str,
	next_id: AtomicU64,
	/// Bumped by `clear`; jobs carrying an older generation are rejected.
	generation: AtomicU64,
	/// Cancels the in-flight processor. Replaced on every `clear`.
	cancel: Mutex<CancellationToken>,
	queued: AtomicUsize,
	processing: AtomicBool,
}

/// FIFO queue running one async operation at a time.
pub struct OperationQueue<T, E> {
	tx: mpsc::UnboundedSender<Job<T, E>>,
	shared: Arc<Shared>,
}

impl<T, E> std::fmt::Debug for OperationQueue<T, E> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OperationQueue")
			.field("name", &self.shared.name)
			.field("size", &self.size())
			.field("processing", &self.is_processing())
			.finish()
	}
}

impl<T, E> OperationQueue<T, E>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Creates a queue and spawns its drain task on the current runtime.
	pub fn new(name: &'static str) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		let shared = Arc::new(Shared {
			name,
			next_id: AtomicU64::new(1),
			generation: AtomicU64::new(0),
			cancel: Mutex::new(CancellationToken::new()),
			queued: AtomicUsize::new(0),
			processing: AtomicBool::new(false),
		});
		spawn(TaskClass::Background, drain(rx, Arc::clone(&shared)));
		Self { tx, shared }
	}

	/// Enqueues `processor` and waits for its outcome.
	///
	/// The processor does not start until every previously enqueued operation has
	/// finished.
	pub async fn enqueue<F>(&self, label: &'static str, processor: F) -> Result<T, QueueError<E>>
	where
		F: Future<Output = Result<T, E>> + Send + 'static,
	{
		let (reply, rx) = oneshot::channel();
		let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
		let job = Job {
			id,
			generation: self.shared.generation.load(Ordering::Acquire),
			label,
			processor: Box::pin(processor),
			reply,
		};

		self.shared.queued.fetch_add(1, Ordering::AcqRel);
		if self.tx.send(job).is_err() {
			self.shared.queued.fetch_sub(1, Ordering::AcqRel);
			return Err(QueueError::Closed);
		}
		trace!(queue = self.shared.name, op = label, id, "queue.enqueue");

		rx.await.unwrap_or(Err(QueueError::Closed))
	}
}

impl<T, E> OperationQueue<T, E> {
	/// Rejects all queued and in-flight operations with [`QueueError::Cleared`].
	///
	/// Operations enqueued after this call run normally.
	pub fn clear(&self) {
		let mut cancel = self.shared.cancel.lock();
		self.shared.generation.fetch_add(1, Ordering::AcqRel);
		let previous = std::mem::replace(&mut *cancel, CancellationToken::new());
		previous.cancel();
		debug!(queue = self.shared.name, pending = self.size(), "queue cleared");
	}

	/// Number of queued operations plus the in-flight one.
	pub fn size(&self) -> usize {
		self.shared.queued.load(Ordering::Acquire) + usize::from(self.is_processing())
	}

	/// Returns true while an operation's processor is running.
	pub fn is_processing(&self) -> bool {
		self.shared.processing.load(Ordering::Acquire)
	}
}

async fn drain<T, E>(mut rx: mpsc::UnboundedReceiver<Job<T, E>>, shared: Arc<Shared>) {
	while let Some(job) = rx.recv().await {
		shared.queued.fetch_sub(1, Ordering::AcqRel);

		let (token, generation) = {
			let cancel = shared.cancel.lock();
			(cancel.clone(), shared.generation.load(Ordering::Acquire))
		};
		if job.generation != generation {
			trace!(queue = shared.name, op = job.label, id = job.id, "queue.skip_cleared");
			let _ = job.reply.send(Err(QueueError::Cleared));
			continue;
		}

		shared.processing.store(true, Ordering::Release);
		trace!(queue = shared.name, op = job.label, id = job.id, "queue.start");
		let outcome = tokio::select! {
			biased;
			() = token.cancelled() => Err(QueueError::Cleared),
			result = job.processor => result.map_err(QueueError::Failed),
		};
		shared.processing.store(false, Ordering::Release);
		trace!(queue = shared.name, op = job.label, id = job.id, ok = outcome.is_ok(), "queue.finish");

		let _ = job.reply.send(outcome);
	}
	trace!(queue = shared.name, "queue.drain_exit");
}
