use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ScanError;

/// A minimal newline-delimited JSON-RPC 2.0 client over an arbitrary async
/// byte stream pair. The scanner speaks a strictly synchronous
/// request-then-response protocol (it never pipelines), unlike the proxy's
/// bidirectional bridge, so this stays far simpler than C9's framing.
pub struct JsonRpcClient<R, W> {
    reader: R,
    writer: W,
    next_id: i64,
}

impl<R, W> JsonRpcClient<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    async fn write_value(&mut self, value: &Value) -> Result<(), ScanError> {
        let mut line = serde_json::to_vec(value).map_err(|e| ScanError::Parse(e.to_string()))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads one non-empty NDJSON line and parses it as JSON.
    async fn read_frame(&mut self) -> Result<Value, ScanError> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Err(ScanError::ChildExitedEarly(None));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed).map_err(|e| ScanError::Parse(e.to_string()));
        }
    }

    /// Sends a notification (no `id`); the child must never reply to it.
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), ScanError> {
        let mut frame = json!({"jsonrpc": "2.0", "method": method});
        if let Some(params) = params {
            frame["params"] = params;
        }
        self.write_value(&frame).await
    }

    /// Sends a request and blocks (cooperatively) until the matching
    /// response arrives, skipping any frames that aren't it.
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, ScanError> {
        let id = self.next_id;
        self.next_id += 1;

        let mut frame = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if let Some(params) = params {
            frame["params"] = params;
        }
        self.write_value(&frame).await?;

        loop {
            let response = self.read_frame().await?;
            if response.get("id") != Some(&Value::from(id)) {
                continue;
            }
            if let Some(error) = response.get("error") {
                let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                return Err(ScanError::JsonRpc { code, message });
            }
            return Ok(response.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, BufReader};

    #[tokio::test]
    async fn request_matches_response_by_id_and_skips_others() {
        let (client_side, server_side) = duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server_side);
        let mut server_reader = BufReader::new(server_read);

        // Drive the "server" half manually: read the request line, reply
        // with an unrelated notification first, then the real response.
        let handle = tokio::spawn(async move {
            let mut line = String::new();
            server_reader.read_line(&mut line).await.unwrap();
            let request: Value = serde_json::from_str(line.trim()).unwrap();
            assert_eq!(request["method"], "tools/list");

            server_write
                .write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n")
                .await
                .unwrap();
            let response = json!({"jsonrpc": "2.0", "id": request["id"], "result": {"tools": []}});
            let mut out = serde_json::to_vec(&response).unwrap();
            out.push(b'\n');
            server_write.write_all(&out).await.unwrap();
        });

        let (client_read, client_write) = tokio::io::split(client_side);
        let mut rpc = JsonRpcClient::new(BufReader::new(client_read), client_write);
        let result = rpc.request("tools/list", None).await.unwrap();
        assert_eq!(result["tools"], json!([]));

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn propagates_json_rpc_errors() {
        let (client_side, server_side) = duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server_side);
        let mut server_reader = BufReader::new(server_read);

        let handle = tokio::spawn(async move {
            let mut line = String::new();
            server_reader.read_line(&mut line).await.unwrap();
            let request: Value = serde_json::from_str(line.trim()).unwrap();
            let response = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32601, "message": "method not found"}
            });
            let mut out = serde_json::to_vec(&response).unwrap();
            out.push(b'\n');
            server_write.write_all(&out).await.unwrap();
        });

        let (client_read, client_write) = tokio::io::split(client_side);
        let mut rpc = JsonRpcClient::new(BufReader::new(client_read), client_write);
        let err = rpc.request("resources/list", None).await.unwrap_err();
        match err {
            ScanError::JsonRpc { code, .. } => assert_eq!(code, -32601),
            other => panic!("expected JsonRpc error, got {other:?}"),
        }

        handle.await.unwrap();
    }
}
