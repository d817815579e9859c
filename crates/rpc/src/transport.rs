use async_trait::async_trait;

use crate::Result;
use crate::channel::Channel;
use crate::protocol::Protocol;

/// Sends one command to a prover and resolves with its reply.
///
/// Implementations may assume callers never overlap sends.
#[async_trait]
pub trait ProverTransport: Send + Sync {
	/// Sends `command` and waits for its framed reply.
	async fn send(&self, command: &str) -> Result<String>;
}

#[async_trait]
impl<P: Protocol> ProverTransport for Channel<P> {
	async fn send(&self, command: &str) -> Result<String> {
		Channel::send(self, command).await
	}
}
