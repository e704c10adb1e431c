use serde_json::Value;

use crate::error::ScanError;
use crate::jsonrpc::JsonRpcClient;

const MAX_PAGES: usize = 100;
const MAX_ITEMS: usize = 10_000;

/// Follows `nextCursor` for a paginated list endpoint, accumulating raw
/// result items via `extract`. Enforces the pagination contract in §4.3:
/// method-not-found (-32601) is an empty list, not an error; any other
/// JSON-RPC error propagates; at most 100 pages are followed; a repeated
/// cursor aborts pagination (loop detection); and more than 10 000
/// accumulated items fails with `scan-limit-exceeded`.
pub async fn paginate<R, W>(
    client: &mut JsonRpcClient<R, W>,
    endpoint: &'static str,
    extract: impl Fn(&Value) -> Vec<Value>,
) -> Result<Vec<Value>, ScanError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen_cursors = std::collections::HashSet::new();

    for _ in 0..MAX_PAGES {
        let params = cursor
            .as_ref()
            .map(|c| serde_json::json!({"cursor": c}));

        let result = match client.request(endpoint, params).await {
            Ok(result) => result,
            Err(ScanError::JsonRpc { code, .. }) if code == -32601 => {
                return Ok(items);
            }
            Err(e) => return Err(e),
        };

        items.extend(extract(&result));
        if items.len() > MAX_ITEMS {
            return Err(ScanError::ScanLimitExceeded {
                endpoint,
                limit: MAX_ITEMS,
            });
        }

        match result.get("nextCursor").and_then(Value::as_str) {
            Some(next) if !next.is_empty() => {
                if !seen_cursors.insert(next.to_string()) {
                    break; // repeated cursor: loop detection
                }
                cursor = Some(next.to_string());
            }
            _ => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn run_fake_server(
        server_side: tokio::io::DuplexStream,
        pages: Vec<Value>,
    ) {
        let (read, mut write) = tokio::io::split(server_side);
        let mut reader = BufReader::new(read);
        for page in pages {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let request: Value = serde_json::from_str(line.trim()).unwrap();
            let mut response = json!({"jsonrpc": "2.0", "id": request["id"]});
            response["result"] = page;
            let mut out = serde_json::to_vec(&response).unwrap();
            out.push(b'\n');
            write.write_all(&out).await.unwrap();
        }
    }

    #[tokio::test]
    async fn follows_next_cursor_across_pages() {
        let (client_side, server_side) = duplex(8192);
        let pages = vec![
            json!({"prompts": [{"name": "a"}], "nextCursor": "p2"}),
            json!({"prompts": [{"name": "b"}]}),
        ];
        let handle = tokio::spawn(run_fake_server(server_side, pages));

        let (read, write) = tokio::io::split(client_side);
        let mut client = JsonRpcClient::new(BufReader::new(read), write);
        let items = paginate(&mut client, "prompts/list", |v| {
            v.get("prompts").and_then(Value::as_array).cloned().unwrap_or_default()
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 2);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn method_not_found_yields_empty_list() {
        let (client_side, server_side) = duplex(8192);
        let (read, mut write) = tokio::io::split(server_side);
        let mut reader = BufReader::new(read);
        let handle = tokio::spawn(async move {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let request: Value = serde_json::from_str(line.trim()).unwrap();
            let response = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32601, "message": "method not found"}
            });
            let mut out = serde_json::to_vec(&response).unwrap();
            out.push(b'\n');
            write.write_all(&out).await.unwrap();
        });

        let (read, write) = tokio::io::split(client_side);
        let mut client = JsonRpcClient::new(BufReader::new(read), write);
        let items = paginate(&mut client, "resources/templates/list", |v| {
            v.get("resourceTemplates")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        })
        .await
        .unwrap();

        assert!(items.is_empty());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn repeated_cursor_breaks_the_loop() {
        let (client_side, server_side) = duplex(8192);
        let pages = vec![
            json!({"prompts": [{"name": "a"}], "nextCursor": "same"}),
            json!({"prompts": [{"name": "b"}], "nextCursor": "same"}),
        ];
        let handle = tokio::spawn(run_fake_server(server_side, pages));

        let (read, write) = tokio::io::split(client_side);
        let mut client = JsonRpcClient::new(BufReader::new(read), write);
        let items = paginate(&mut client, "prompts/list", |v| {
            v.get("prompts").and_then(Value::as_array).cloned().unwrap_or_default()
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 2, "loop must stop after the cursor repeats");
        handle.await.unwrap();
    }
}
