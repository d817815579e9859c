use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use vellum_primitives::Span;
use vellum_rpc::ProverTransport;

use crate::sink::{DecorationSink, InfoUpdate, PresentationSink, Sinks};
use crate::state::{LineStatus, SessionState};

/// Records every command and rejects the ones it was told to.
#[derive(Default)]
pub(crate) struct ScriptedProver {
	reject: HashSet<String>,
	latency: Option<Duration>,
	/// `send:<cmd>` when a send starts, `ack:<cmd>` when it resolves.
	pub(crate) log: Mutex<Vec<String>>,
}

impl ScriptedProver {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn rejecting(mut self, command: &str) -> Self {
		self.reject.insert(command.to_owned());
		self
	}

	pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	/// Commands sent so far, in order.
	pub(crate) fn sent(&self) -> Vec<String> {
		self.log.lock().iter().filter_map(|entry| entry.strip_prefix("send:").map(str::to_owned)).collect()
	}
}

#[async_trait]
impl ProverTransport for ScriptedProver {
	async fn send(&self, command: &str) -> vellum_rpc::Result<String> {
		self.log.lock().push(format!("send:{command}"));
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
		self.log.lock().push(format!("ack:{command}"));
		if self.reject.contains(command) {
			Err(vellum_rpc::Error::Rejected(format!("Error: cannot check {command}")))
		} else {
			Ok(format!("{command} accepted"))
		}
	}
}

pub(crate) fn shared_state() -> Arc<RwLock<SessionState>> {
	Arc::new(RwLock::new(SessionState::new()))
}

/// Decoration update as received by [`RecordingSink`].
pub(crate) type Decorations = (Span, Option<Span>, BTreeMap<u32, LineStatus>);

/// Keeps every presentation and decoration update.
#[derive(Default)]
pub(crate) struct RecordingSink {
	pub(crate) infos: Mutex<Vec<InfoUpdate>>,
	pub(crate) decorations: Mutex<Vec<Decorations>>,
	pub(crate) opened: AtomicUsize,
}

impl RecordingSink {
	pub(crate) fn last_info(&self) -> Option<InfoUpdate> {
		self.infos.lock().last().cloned()
	}

	pub(crate) fn last_decorations(&self) -> Option<Decorations> {
		self.decorations.lock().last().cloned()
	}

	pub(crate) fn sinks(self: &Arc<Self>) -> Sinks {
		Sinks::new(self.clone(), self.clone())
	}
}

impl PresentationSink for RecordingSink {
	fn update(&self, info: InfoUpdate) {
		self.infos.lock().push(info);
	}

	fn open(&self) {
		self.opened.fetch_add(1, Ordering::SeqCst);
	}
}

impl DecorationSink for RecordingSink {
	fn update(&self, evaluated: Span, error: Option<Span>, lines: &BTreeMap<u32, LineStatus>) {
		self.decorations.lock().push((evaluated, error, lines.clone()));
	}
}
