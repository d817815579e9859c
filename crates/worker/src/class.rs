/// Shared execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Latency-sensitive work that directly affects interactive UX.
	Interactive,
	/// Background async work such as draining an operation queue.
	Background,
	/// Long-lived readers of subprocess streams.
	Io,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::Io => "io",
		}
	}
}
