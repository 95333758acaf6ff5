//! Subprocess execution with streamed, line-split output.
//!
//! Installers report progress with carriage returns as well as newlines;
//! see [`LineSplitter`].

use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Stdio};

use reviewlens_core::ports::LineSink;
use reviewlens_core::utils::LineSplitter;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Lines kept from the end of a command's output for error messages.
const TAIL_LINES: usize = 20;

/// Output of a finished command.
#[derive(Debug)]
pub(crate) struct CommandOutcome {
    pub(crate) status: ExitStatus,
    tail: VecDeque<String>,
}

impl CommandOutcome {
    /// The last lines of combined output, for error messages.
    pub(crate) fn tail(&self) -> String {
        self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// The error message to report when the command failed.
    pub(crate) fn failure(&self) -> String {
        let tail = self.tail();
        if tail.is_empty() {
            format!("exited with {}", self.status)
        } else {
            format!("exited with {}: {tail}", self.status)
        }
    }
}

/// Run `command` to completion, passing every output line to `on_line`.
pub(crate) async fn run_streaming(
    mut command: Command,
    on_line: LineSink<'_>,
) -> io::Result<CommandOutcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (out_tail, err_tail) = tokio::join!(
        pump(stdout, "stdout", on_line),
        pump(stderr, "stderr", on_line)
    );
    let status = child.wait().await?;

    let mut tail: VecDeque<String> = out_tail.into_iter().chain(err_tail).collect();
    while tail.len() > TAIL_LINES {
        tail.pop_front();
    }

    Ok(CommandOutcome { status, tail })
}

async fn pump(
    stream: Option<impl AsyncRead + Unpin>,
    stream_type: &'static str,
    on_line: LineSink<'_>,
) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(TAIL_LINES);
    let Some(mut stream) = stream else {
        return tail;
    };

    let mut splitter = LineSplitter::default();
    let mut buf = vec![0_u8; 4096];
    let mut emit = |line: String| {
        on_line(&line);
        if tail.len() == TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    };

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => splitter.feed(&buf[..n]).into_iter().for_each(&mut emit),
            Err(e) => {
                debug!(%stream_type, error = %e, "Command output reader exiting");
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        emit(line);
    }

    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_streaming_collects_both_streams() {
        let seen = Mutex::new(Vec::new());
        let on_line = |line: &str| seen.lock().unwrap().push(line.to_string());

        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 2"]);
        let outcome = run_streaming(command, &on_line).await.unwrap();

        assert_eq!(outcome.status.code(), Some(2));
        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, vec!["err", "out"]);
        assert!(outcome.failure().contains("exited with"));
    }
}
