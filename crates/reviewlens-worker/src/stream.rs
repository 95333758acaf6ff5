//! Async stream readers for the worker's output pipes.
//!
//! The worker's libraries can emit non-UTF8 bytes on stderr, and
//! `BufReader::lines()` terminates on invalid UTF-8, so output is read as
//! raw chunks and framed by the caller.

use reviewlens_core::utils::LineSplitter;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Read `stream` until EOF, handing each line to `on_line`.
///
/// Lines end at `\n` or a bare `\r`, so tqdm bars that redraw in place are
/// seen on every update rather than once when the bar closes.
pub(crate) fn spawn_line_reader<F>(
    stream: impl AsyncRead + Unpin + Send + 'static,
    stream_type: &'static str,
    mut on_line: F,
) where
    F: FnMut(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut splitter = LineSplitter::new();
        read_chunks(stream, stream_type, |chunk| {
            splitter.feed(chunk).into_iter().for_each(&mut on_line);
        })
        .await;
        if let Some(line) = splitter.finish() {
            on_line(line);
        }
    });
}

/// Read `stream` in raw chunks until EOF or a read error.
///
/// Framing is left to the caller so partial lines survive chunk boundaries.
pub(crate) async fn read_chunks<F>(
    stream: impl AsyncRead + Unpin + Send,
    stream_type: &'static str,
    mut on_chunk: F,
) where
    F: FnMut(&[u8]) + Send,
{
    let mut reader = stream;
    let mut buf = vec![0_u8; CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => on_chunk(&buf[..n]),
            Err(e) => {
                debug!(%stream_type, error = %e, "stream reader exiting due to read error");
                break;
            }
        }
    }

    debug!(%stream_type, "stream reached EOF");
}
