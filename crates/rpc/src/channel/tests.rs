use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

use super::*;

enum Response {
	Reply(String),
	Chunks(Vec<String>),
	Stderr(String),
	Late(Duration, String),
	Silent,
}

/// In-process prover speaking the Adelfa REPL conventions over duplex pipes.
fn fake_prover<F>(timeout: Option<Duration>, respond: F) -> Channel
where
	F: Fn(&str) -> Response + Send + 'static,
{
	let (chan_stdin, mut prover_stdin) = duplex(4096);
	let (mut prover_stdout, chan_stdout) = duplex(4096);
	let (mut prover_stderr, chan_stderr) = duplex(4096);

	tokio::spawn(async move {
		let mut pending = Vec::new();
		let mut buf = [0u8; 256];
		loop {
			let n = match prover_stdin.read(&mut buf).await {
				Ok(0) | Err(_) => break,
				Ok(n) => n,
			};
			pending.extend_from_slice(&buf[..n]);
			while let Some(end) = pending.iter().position(|b| *b == b'\r') {
				let line: Vec<u8> = pending.drain(..=end).collect();
				let command = String::from_utf8_lossy(&line[..line.len() - 1]).to_string();
				match respond(&command) {
					Response::Reply(text) => {
						let _ = prover_stdout.write_all(format!("{text}\n>> ").as_bytes()).await;
					}
					Response::Chunks(chunks) => {
						for chunk in chunks {
							let _ = prover_stdout.write_all(chunk.as_bytes()).await;
							tokio::time::sleep(Duration::from_millis(5)).await;
						}
					}
					Response::Stderr(text) => {
						let _ = prover_stderr.write_all(text.as_bytes()).await;
					}
					Response::Late(delay, text) => {
						tokio::time::sleep(delay).await;
						let _ = prover_stdout.write_all(format!("{text}\n>> ").as_bytes()).await;
					}
					Response::Silent => {}
				}
			}
		}
	});

	Channel::new(Dialect::Adelfa, chan_stdin, chan_stdout, chan_stderr, timeout)
}

#[tokio::test(start_paused = true)]
async fn reply_is_framed_at_prompt() {
	let channel = fake_prover(None, |cmd| Response::Reply(format!("accepted {cmd}")));

	let reply = channel.send("z : nat.").await.unwrap();
	assert_eq!(reply, "accepted z : nat.");
	assert!(!channel.is_busy());
}

#[tokio::test(start_paused = true)]
async fn reply_accumulates_across_chunks() {
	let channel = fake_prover(None, |_| {
		Response::Chunks(vec!["Subgoal 1:\n".into(), "\n  x = x\n".into(), "\nfoo >> ".into()])
	});

	let reply = channel.send("intros.").await.unwrap();
	assert_eq!(reply, "Subgoal 1:\n\n  x = x");
}

#[tokio::test(start_paused = true)]
async fn stderr_output_rejects_command() {
	let channel = fake_prover(None, |cmd| {
		if cmd.starts_with("bad") {
			Response::Stderr("Error: unknown constant bad\n".into())
		} else {
			Response::Reply("ok".into())
		}
	});

	let err = channel.send("bad.").await.unwrap_err();
	assert!(matches!(err, Error::Rejected(ref msg) if msg == "Error: unknown constant bad"));
	assert_eq!(channel.send("ok.").await.unwrap(), "ok");
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_only_that_command() {
	let channel = fake_prover(Some(Duration::from_millis(50)), |cmd| {
		if cmd == "hang." {
			Response::Late(Duration::from_millis(70), "hang output".into())
		} else {
			Response::Reply("done".into())
		}
	});

	let err = channel.send("hang.").await.unwrap_err();
	assert!(matches!(err, Error::Timeout(limit) if limit == Duration::from_millis(50)));
	assert!(!channel.is_busy());
	assert_eq!(channel.send("next.").await.unwrap(), "done");
}

#[tokio::test(start_paused = true)]
async fn late_reply_is_not_given_to_next_command() {
	let channel = fake_prover(Some(Duration::from_millis(50)), |cmd| {
		if cmd == "slow." {
			Response::Late(Duration::from_millis(80), "slow output".into())
		} else {
			Response::Reply(format!("{cmd} done"))
		}
	});

	assert!(matches!(channel.send("slow.").await, Err(Error::Timeout(_))));
	assert_eq!(channel.send("next.").await.unwrap(), "next. done");
	assert_eq!(channel.send("third.").await.unwrap(), "third. done");
}

#[tokio::test(start_paused = true)]
async fn late_reply_split_across_chunks_is_dropped() {
	let channel = fake_prover(Some(Duration::from_millis(8)), |cmd| match cmd {
		"slow." => Response::Chunks(vec![
			"partial ".into(),
			"still going".into(),
			"\n>> ".into(),
		]),
		_ => Response::Reply(format!("{cmd} done")),
	});
	// Chunks arrive 5ms apart; the prompt lands after the timeout.
	assert!(matches!(channel.send("slow.").await, Err(Error::Timeout(_))));
	assert_eq!(channel.send("next.").await.unwrap(), "next. done");
}

#[tokio::test(start_paused = true)]
async fn overlapping_send_is_a_usage_error() {
	let channel = fake_prover(Some(Duration::from_millis(20)), |_| Response::Silent);

	let (first, second) = tokio::join!(channel.send("first."), channel.send("second."));
	assert!(matches!(first, Err(Error::Timeout(_))));
	assert!(matches!(second, Err(Error::Busy)));
}

#[tokio::test(start_paused = true)]
async fn eof_fails_outstanding_command() {
	let (chan_stdin, _prover_stdin) = duplex(64);
	let (prover_stdout, chan_stdout) = duplex(64);
	let (_prover_stderr, chan_stderr) = duplex(64);
	let channel = Channel::new(Dialect::Adelfa, chan_stdin, chan_stdout, chan_stderr, None);

	let send = channel.send("z : nat.");
	let close = async {
		tokio::time::sleep(Duration::from_millis(10)).await;
		drop(prover_stdout);
	};
	let (reply, ()) = tokio::join!(send, close);

	assert!(matches!(reply, Err(Error::Closed)));
	assert!(channel.is_closed());
	assert!(matches!(channel.send("again.").await, Err(Error::Closed)));
}

#[tokio::test(start_paused = true)]
async fn unsolicited_output_is_discarded() {
	let (chan_stdin, mut prover_stdin) = duplex(256);
	let (mut prover_stdout, chan_stdout) = duplex(256);
	let (_prover_stderr, chan_stderr) = duplex(64);
	let channel = Channel::new(Dialect::Adelfa, chan_stdin, chan_stdout, chan_stderr, None);

	prover_stdout.write_all(b"Welcome to Adelfa\n>> ").await.unwrap();
	tokio::time::sleep(Duration::from_millis(10)).await;

	let serve = async {
		let mut buf = [0u8; 64];
		let n = prover_stdin.read(&mut buf).await.unwrap();
		assert_eq!(&buf[..n], b"nat : type.\r");
		prover_stdout.write_all(b"nat is declared.\n>> ").await.unwrap();
	};
	let (reply, ()) = tokio::join!(channel.send("nat : type."), serve);

	assert_eq!(reply.unwrap(), "nat is declared.");
}
