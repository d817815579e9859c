//! Prompt-framed request/reply channel.
//!
//! One long-lived reader task per output stream dispatches bytes to whichever
//! command is outstanding. At most one command may be outstanding at a time;
//! output arriving while nothing is outstanding is discarded.
//!
//! A command that times out is still owed a reply. That reply is dropped when
//! it arrives, so later commands stay paired with their own output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use vellum_worker::{TaskClass, spawn};

use crate::protocol::{Dialect, Frame, Protocol};
use crate::{Error, Result};

#[cfg(test)]
mod tests;

/// Default per-command reply timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK: usize = 4096;

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct InFlight {
	id: u64,
	stdout: Vec<u8>,
	reply_tx: oneshot::Sender<Result<String>>,
}

/// Reader-side bookkeeping shared with `send`.
#[derive(Default)]
struct Dispatch {
	in_flight: Option<InFlight>,
	/// Replies still owed to commands that timed out.
	stale: usize,
	/// Partial output of the oldest owed reply.
	stale_buf: Vec<u8>,
}

impl Dispatch {
	/// Gives up on command `id`, if it is still outstanding, and expects its
	/// reply later.
	fn abandon(&mut self, id: u64) {
		if let Some(in_flight) = self.in_flight.take_if(|in_flight| in_flight.id == id) {
			self.stale += 1;
			self.stale_buf.extend_from_slice(&in_flight.stdout);
		}
	}

	/// Drops owed replies from the front of `incoming`; returns what is left.
	fn skip_stale(&mut self, mut incoming: Vec<u8>, terminator: &[u8]) -> Vec<u8> {
		while self.stale > 0 && !incoming.is_empty() {
			self.stale_buf.append(&mut incoming);
			let Some(idx) = find(&self.stale_buf, terminator) else {
				break;
			};
			incoming = self.stale_buf.split_off(idx + terminator.len());
			self.stale_buf.clear();
			self.stale -= 1;
			trace!(owed = self.stale, "dropped late reply to a timed-out command");
		}
		incoming
	}
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	if needle.is_empty() {
		return Some(0);
	}
	haystack.windows(needle.len()).position(|window| window == needle)
}

type Slot = Arc<Mutex<Dispatch>>;

/// Request/reply channel over a prover's stdin, stdout and stderr.
pub struct Channel<P = Dialect> {
	protocol: Arc<P>,
	stdin: tokio::sync::Mutex<BoxWriter>,
	slot: Slot,
	closed: Arc<AtomicBool>,
	next_id: AtomicU64,
	timeout: Option<Duration>,
	readers: [JoinHandle<()>; 2],
}

impl<P: Protocol> std::fmt::Debug for Channel<P> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Channel")
			.field("protocol", &self.protocol.name())
			.field("timeout", &self.timeout)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}

impl<P: Protocol> Channel<P> {
	/// Wraps the prover's pipes and spawns one reader task per output stream.
	///
	/// `timeout` of `None` waits indefinitely for each reply.
	pub fn new<W, R, E>(protocol: P, stdin: W, stdout: R, stderr: E, timeout: Option<Duration>) -> Self
	where
		W: AsyncWrite + Send + Unpin + 'static,
		R: AsyncRead + Send + Unpin + 'static,
		E: AsyncRead + Send + Unpin + 'static,
	{
		let protocol = Arc::new(protocol);
		let slot: Slot = Arc::default();
		let closed = Arc::new(AtomicBool::new(false));

		let stdout_reader = spawn(
			TaskClass::Io,
			read_replies(stdout, Arc::clone(&protocol), Arc::clone(&slot), Arc::clone(&closed)),
		);
		let stderr_reader = spawn(TaskClass::Io, read_failures(stderr, Arc::clone(&slot)));

		Self {
			protocol,
			stdin: tokio::sync::Mutex::new(Box::new(stdin)),
			slot,
			closed,
			next_id: AtomicU64::new(1),
			timeout,
			readers: [stdout_reader, stderr_reader],
		}
	}

	/// The protocol this channel frames replies with.
	pub fn protocol(&self) -> &P {
		&self.protocol
	}

	/// Returns true once the prover's stdout reached EOF.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Returns true while a command is outstanding.
	pub fn is_busy(&self) -> bool {
		self.slot.lock().in_flight.is_some()
	}

	/// Sends one command and waits for its reply.
	///
	/// Fails with [`Error::Busy`] if another command is still outstanding, with
	/// [`Error::Rejected`] if the prover reports a failure, and with
	/// [`Error::Timeout`] if no terminator arrives in time. A timeout only fails
	/// this command; the channel stays usable.
	pub async fn send(&self, command: &str) -> Result<String> {
		if self.is_closed() {
			return Err(Error::Closed);
		}

		let (reply_tx, reply_rx) = oneshot::channel();
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		{
			let mut slot = self.slot.lock();
			if slot.in_flight.is_some() {
				return Err(Error::Busy);
			}
			slot.in_flight = Some(InFlight {
				id,
				stdout: Vec::new(),
				reply_tx,
			});
		}
		let _release = SlotRelease { slot: &self.slot, id };

		debug!(prover = self.protocol.name(), id, command, "prover.send");
		let bytes = self.protocol.encode_command(command);
		{
			let mut stdin = self.stdin.lock().await;
			stdin.write_all(&bytes).await?;
			stdin.flush().await?;
		}

		let reply = match self.timeout {
			Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
				Ok(reply) => reply,
				Err(_) => {
					warn!(prover = self.protocol.name(), id, command, timeout_ms = limit.as_millis() as u64, "prover command timed out");
					self.slot.lock().abandon(id);
					return Err(Error::Timeout(limit));
				}
			},
			None => reply_rx.await,
		};

		let reply = reply.map_err(|_| Error::Closed)?;
		match &reply {
			Ok(payload) => trace!(prover = self.protocol.name(), id, len = payload.len(), "prover.reply"),
			Err(err) => debug!(prover = self.protocol.name(), id, error = %err, "prover.failure"),
		}
		reply
	}
}

impl<P> Drop for Channel<P> {
	fn drop(&mut self) {
		for reader in &self.readers {
			reader.abort();
		}
	}
}

/// Frees the in-flight slot when `send` returns or its future is dropped.
struct SlotRelease<'a> {
	slot: &'a Mutex<Dispatch>,
	id: u64,
}

impl Drop for SlotRelease<'_> {
	fn drop(&mut self) {
		let _ = self.slot.lock().in_flight.take_if(|in_flight| in_flight.id == self.id);
	}
}

async fn read_replies<R, P>(mut stdout: R, protocol: Arc<P>, slot: Slot, closed: Arc<AtomicBool>)
where
	R: AsyncRead + Unpin,
	P: Protocol,
{
	let mut chunk = vec![0u8; READ_CHUNK];
	loop {
		let n = match stdout.read(&mut chunk).await {
			Ok(0) => break,
			Ok(n) => n,
			Err(err) => {
				warn!(prover = protocol.name(), error = %err, "error reading prover stdout");
				break;
			}
		};

		let mut guard = slot.lock();
		let incoming = guard.skip_stale(chunk[..n].to_vec(), protocol.terminator().as_bytes());
		if incoming.is_empty() {
			continue;
		}
		let Some(in_flight) = guard.in_flight.as_mut() else {
			trace!(prover = protocol.name(), bytes = incoming.len(), "discarding unsolicited prover output");
			continue;
		};
		in_flight.stdout.extend_from_slice(&incoming);

		let outcome = match protocol.frame(&String::from_utf8_lossy(&in_flight.stdout)) {
			Frame::Incomplete => continue,
			Frame::Reply(payload) => Ok(payload),
			Frame::Rejected(message) => Err(Error::Rejected(message)),
		};
		if let Some(done) = guard.in_flight.take() {
			let _ = done.reply_tx.send(outcome);
		}
	}

	closed.store(true, Ordering::Release);
	debug!(prover = protocol.name(), "prover stdout closed");
	if let Some(in_flight) = slot.lock().in_flight.take() {
		let _ = in_flight.reply_tx.send(Err(Error::Closed));
	}
}

async fn read_failures<R>(mut stderr: R, slot: Slot)
where
	R: AsyncRead + Unpin,
{
	let mut chunk = vec![0u8; READ_CHUNK];
	loop {
		let n = match stderr.read(&mut chunk).await {
			Ok(0) | Err(_) => break,
			Ok(n) => n,
		};
		let message = String::from_utf8_lossy(&chunk[..n]).trim().to_string();

		let mut guard = slot.lock();
		if guard.stale > 0 {
			warn!(stderr = %message, "prover stderr for a timed-out command");
			continue;
		}
		match guard.in_flight.take() {
			Some(in_flight) => {
				let _ = in_flight.reply_tx.send(Err(Error::Rejected(message)));
			}
			None => warn!(stderr = %message, "prover stderr with no command outstanding"),
		}
	}
}
