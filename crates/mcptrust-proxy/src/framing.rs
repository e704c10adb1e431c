use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProxyError;

/// Per-frame line cap (§4.9, §6): a frame over this size is discarded and
/// the connection is torn down.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Reads one NDJSON frame at a time from an async byte stream. CRLF is
/// tolerated on read (the trailing `\r` is stripped); empty lines are
/// ignored (§6).
pub struct FrameReader<R> {
    inner: R,
    direction: &'static str,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, direction: &'static str) -> Self {
        Self { inner, direction }
    }

    /// Returns `Ok(None)` on clean EOF, `Ok(Some(value))` for a parsed
    /// frame, or `Err` on an oversize line (fatal — caller tears down the
    /// connection) or malformed JSON.
    pub async fn read_frame(&mut self, phase: &'static str) -> Result<Option<Value>, ProxyError> {
        loop {
            let mut buf = Vec::new();
            let mut chunk = Vec::with_capacity(4096);
            let mut saw_eof = false;
            let mut oversize = false;

            loop {
                chunk.clear();
                let bytes_read = self
                    .inner
                    .read_until(b'\n', &mut chunk)
                    .await
                    .map_err(|source| ProxyError::Io { side: self.direction, source })?;
                if bytes_read == 0 {
                    saw_eof = buf.is_empty();
                    break;
                }
                let ends_in_newline = chunk.last() == Some(&b'\n');
                if buf.len() + chunk.len() <= MAX_LINE_BYTES {
                    buf.extend_from_slice(&chunk);
                } else {
                    oversize = true;
                }
                if ends_in_newline {
                    break;
                }
            }

            if saw_eof && buf.is_empty() {
                return Ok(None);
            }

            if oversize {
                return Err(ProxyError::OversizeLine {
                    direction: self.direction,
                    limit_bytes: MAX_LINE_BYTES,
                    phase,
                });
            }

            while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
                buf.pop();
            }
            if buf.is_empty() {
                if saw_eof {
                    return Ok(None);
                }
                continue;
            }

            let text = std::str::from_utf8(&buf).map_err(|e| ProxyError::Parse {
                side: self.direction,
                reason: e.to_string(),
            })?;
            return serde_json::from_str(text)
                .map(Some)
                .map_err(|e| ProxyError::Parse { side: self.direction, reason: e.to_string() });
        }
    }
}

/// Writes one NDJSON frame, always terminated with a single `\n` (§6).
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> Result<(), ProxyError> {
    let mut bytes = serde_json::to_vec(value).map_err(|e| ProxyError::Parse {
        side: "writer",
        reason: e.to_string(),
    })?;
    bytes.push(b'\n');
    writer
        .write_all(&bytes)
        .await
        .map_err(|source| ProxyError::Io { side: "writer", source })?;
    writer.flush().await.map_err(|source| ProxyError::Io { side: "writer", source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_lf_and_crlf_and_ignores_empty_lines() {
        let data = b"\r\n{\"a\":1}\r\n{\"b\":2}\n".to_vec();
        let mut reader = FrameReader::new(BufReader::new(&data[..]), "test");
        assert_eq!(reader.read_frame("test").await.unwrap(), Some(serde_json::json!({"a": 1})));
        assert_eq!(reader.read_frame("test").await.unwrap(), Some(serde_json::json!({"b": 2})));
        assert_eq!(reader.read_frame("test").await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversize_line_is_rejected() {
        let mut huge = vec![b'1'; MAX_LINE_BYTES + 16];
        huge.push(b'\n');
        let mut reader = FrameReader::new(BufReader::new(&huge[..]), "test");
        let err = reader.read_frame("test").await.unwrap_err();
        assert!(matches!(err, ProxyError::OversizeLine { .. }));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let data = b"not json\n".to_vec();
        let mut reader = FrameReader::new(BufReader::new(&data[..]), "test");
        assert!(matches!(reader.read_frame("test").await, Err(ProxyError::Parse { .. })));
    }

    #[tokio::test]
    async fn write_frame_appends_a_single_trailing_newline() {
        let mut out = Vec::new();
        write_frame(&mut out, &serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(out, b"{\"a\":1}\n");
    }
}
