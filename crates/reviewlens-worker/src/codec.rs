//! Newline-delimited JSON framing for the worker protocol.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::WorkerCommand;

/// Field carrying the correlation id on outbound commands and responses.
pub const CALL_ID_FIELD: &str = "_callId";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode command '{action}': {source}")]
    Encode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    /// A complete line was not valid JSON. Framing is unaffected.
    #[error("Malformed worker line {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Stateful line decoder plus a stateless encoder.
///
/// `feed` may be called with arbitrary chunk boundaries; an incomplete
/// trailing fragment is held until the next newline arrives.
#[derive(Debug, Default)]
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `command` as one line with its correlation id attached.
    pub fn encode(command: &WorkerCommand, call_id: u64) -> Result<Vec<u8>, CodecError> {
        let mut object: Map<String, Value> = command.params().clone();
        object.insert("action".to_string(), Value::from(command.action()));
        object.insert(CALL_ID_FIELD.to_string(), Value::from(call_id));

        let mut bytes =
            serde_json::to_vec(&Value::Object(object)).map_err(|source| CodecError::Encode {
                action: command.action().to_string(),
                source,
            })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Append `chunk` and decode every complete line it finishes.
    ///
    /// Blank lines are skipped. A line that fails to parse yields an
    /// `Err` in its position and decoding continues with the next line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Value, CodecError>> {
        self.buffer.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let mut line = &self.buffer[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            start = end + 1;

            let text = String::from_utf8_lossy(line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            decoded.push(
                serde_json::from_str(text).map_err(|source| CodecError::Decode {
                    line: text.to_string(),
                    source,
                }),
            );
        }

        self.buffer.drain(..start);
        decoded
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any buffered partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
