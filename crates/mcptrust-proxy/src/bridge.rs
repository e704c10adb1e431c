use std::sync::Arc;

use mcptrust_enforcer::Enforcer;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::filter::{ResolveOutcome, ResponseFilter};
use crate::framing::{write_frame, FrameReader};
use crate::ids::validate_host_id;
use crate::mode::EnforceMode;

const LIST_METHODS: &[&str] = &["tools/list", "prompts/list", "resources/templates/list", "resources/list"];

/// One-shot wake signal shared between the two bridge tasks (§9): whichever
/// task hits an unrecoverable error calls [`Cancellation::cancel`], which
/// wakes the other task out of its next select. `notify_one` buffers a
/// permit, so a cancel that lands before the other side starts waiting is
/// not lost.
pub struct Cancellation {
    notify: Notify,
}

impl Cancellation {
    pub fn new() -> Self {
        Self { notify: Notify::new() }
    }

    pub fn cancel(&self) {
        self.notify.notify_one();
    }

    pub async fn cancelled(&self) {
        self.notify.notified().await;
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the bridge stopped. The caller owns the child process and decides
/// how to act on this (kill-and-wait, propagate an exit code, ...).
#[derive(Debug)]
pub enum BridgeExit {
    HostEof,
    ChildEof,
    HostError(ProxyError),
    ChildError(ProxyError),
}

impl BridgeExit {
    /// The process exit code to report for a clean EOF on either side
    /// (§4.9 — "exits with the child's exit code (or 0 on clean EOF)").
    /// Errors are not representable as a bare exit code; callers should log
    /// them separately.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::HostEof | Self::ChildEof)
    }
}

/// Configuration that does not change for the lifetime of one bridge run.
pub struct BridgeConfig {
    pub mode: EnforceMode,
    /// Only `resources/list` is gated on static-resource capture having
    /// been enabled at preflight (§4.9); the other three list endpoints are
    /// always filtered when `mode.filters_lists()`.
    pub filter_resources_list: bool,
}

/// Runs the bidirectional bridge until either side hits EOF or an
/// unrecoverable error, then returns which happened first (§9: "no
/// coordination is required between the two tasks beyond this lock" — the
/// lock here is the `ResponseFilter`'s; cancellation is a separate, simpler
/// one-shot signal).
pub async fn bridge<HR, HW, CR, CW>(
    host_reader: HR,
    host_writer: HW,
    child_reader: CR,
    child_writer: CW,
    enforcer: Arc<Enforcer>,
    filter: Arc<ResponseFilter>,
    config: BridgeConfig,
) -> BridgeExit
where
    HR: AsyncBufRead + Unpin + Send + 'static,
    HW: AsyncWrite + Unpin + Send + 'static,
    CR: AsyncBufRead + Unpin + Send + 'static,
    CW: AsyncWrite + Unpin + Send + 'static,
{
    let cancel = Arc::new(Cancellation::new());
    let first_exit: Arc<std::sync::Mutex<Option<BridgeExit>>> = Arc::new(std::sync::Mutex::new(None));
    let host_writer = Arc::new(Mutex::new(host_writer));

    let host_to_child = {
        let cancel = cancel.clone();
        let first_exit = first_exit.clone();
        let host_writer = host_writer.clone();
        let filter = filter.clone();
        let enforcer = enforcer.clone();
        let mode = config.mode;
        async move {
            let exit = run_host_to_child(
                FrameReader::new(host_reader, "host->proxy"),
                child_writer,
                host_writer,
                filter,
                enforcer,
                mode,
                &cancel,
            )
            .await;
            record_first_exit(&first_exit, exit);
            cancel.cancel();
        }
    };

    let child_to_host = {
        let cancel = cancel.clone();
        let first_exit = first_exit.clone();
        let host_writer = host_writer.clone();
        let filter_resources_list = config.filter_resources_list;
        let mode = config.mode;
        async move {
            let exit = run_child_to_host(
                FrameReader::new(child_reader, "server->proxy"),
                host_writer,
                filter,
                enforcer,
                mode,
                filter_resources_list,
                &cancel,
            )
            .await;
            record_first_exit(&first_exit, exit);
            cancel.cancel();
        }
    };

    tokio::join!(host_to_child, child_to_host);

    first_exit
        .lock()
        .expect("bridge exit mutex poisoned")
        .take()
        .unwrap_or(BridgeExit::HostEof)
}

fn record_first_exit(slot: &std::sync::Mutex<Option<BridgeExit>>, exit: BridgeExit) {
    let mut guard = slot.lock().expect("bridge exit mutex poisoned");
    if guard.is_none() {
        *guard = Some(exit);
    }
}

async fn write_to<W: AsyncWrite + Unpin>(writer: &Mutex<W>, value: &Value) -> Result<(), ProxyError> {
    let mut guard = writer.lock().await;
    write_frame(&mut *guard, value).await
}

#[allow(clippy::too_many_arguments)]
async fn run_host_to_child<R, CW, HW>(
    mut host_reader: FrameReader<R>,
    mut child_writer: CW,
    host_writer: Arc<Mutex<HW>>,
    filter: Arc<ResponseFilter>,
    enforcer: Arc<Enforcer>,
    mode: EnforceMode,
    cancel: &Cancellation,
) -> BridgeExit
where
    R: AsyncBufRead + Unpin,
    CW: AsyncWrite + Unpin,
    HW: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return BridgeExit::ChildEof,
            frame = host_reader.read_frame("bridge") => frame,
        };

        let value = match frame {
            Ok(Some(value)) => value,
            Ok(None) => return BridgeExit::HostEof,
            Err(err) => {
                warn!(error = %err, "host->proxy frame error, tearing down bridge");
                return BridgeExit::HostError(err);
            }
        };

        let Some(id) = value.get("id").cloned() else {
            // Notification: never registered, never rewritten, passed through verbatim (§4.9).
            if let Err(err) = write_frame(&mut child_writer, &value).await {
                return BridgeExit::ChildError(err);
            }
            continue;
        };

        if let Err(err) = validate_host_id(&id) {
            debug!(error = %err, "rejecting request with invalid host id");
            let _ = write_to(&host_writer, &json!({
                "jsonrpc": "2.0",
                "id": Value::Null,
                "error": {"code": -32600, "message": format!("Invalid Request: {err}")},
            }))
            .await;
            continue;
        }

        let method = value.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
        let params = value.get("params").cloned().unwrap_or(Value::Null);

        if mode.denies_calls() {
            if let Some(reason) = outbound_denial_reason(&enforcer, &method, &params) {
                let _ = write_to(
                    &host_writer,
                    &json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32001, "message": format!("MCPTRUST_DENIED: {reason}")},
                    }),
                )
                .await;
                continue;
            }
        } else if let Some(reason) = outbound_denial_reason(&enforcer, &method, &params) {
            debug!(method, reason, "audit/filter-only mode: would have denied, forwarding instead");
        }

        let proxy_id = match filter.register(id, method) {
            Ok(proxy_id) => proxy_id,
            Err(_) => {
                let host_id = value.get("id").cloned().unwrap_or(Value::Null);
                let _ = write_to(
                    &host_writer,
                    &json!({
                        "jsonrpc": "2.0",
                        "id": host_id,
                        "error": {
                            "code": -32002,
                            "message": "MCPTRUST_OVERLOADED: proxy at capacity, cannot process request safely",
                        },
                    }),
                )
                .await;
                continue;
            }
        };

        let mut outbound = value;
        outbound["id"] = Value::String(proxy_id);
        if let Err(err) = write_frame(&mut child_writer, &outbound).await {
            return BridgeExit::ChildError(err);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_child_to_host<R, HW>(
    mut child_reader: FrameReader<R>,
    host_writer: Arc<Mutex<HW>>,
    filter: Arc<ResponseFilter>,
    enforcer: Arc<Enforcer>,
    mode: EnforceMode,
    filter_resources_list: bool,
    cancel: &Cancellation,
) -> BridgeExit
where
    R: AsyncBufRead + Unpin,
    HW: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return BridgeExit::HostEof,
            frame = child_reader.read_frame("bridge") => frame,
        };

        let mut value = match frame {
            Ok(Some(value)) => value,
            Ok(None) => return BridgeExit::ChildEof,
            Err(err) => {
                warn!(error = %err, "server->proxy frame error, tearing down bridge");
                return BridgeExit::ChildError(err);
            }
        };

        let has_result = value.get("result").is_some();
        let has_error = value.get("error").is_some();

        let Some(child_id) = value.get("id").cloned() else {
            if !has_result && !has_error {
                let _ = write_to(&host_writer, &value).await;
            } else {
                debug!("dropping malformed child frame with no id but a result/error member");
            }
            continue;
        };

        if has_result && has_error {
            value.as_object_mut().expect("frame is always an object").remove("result");
        }

        match filter.resolve(&child_id) {
            ResolveOutcome::Found(entry) => {
                value["id"] = entry.host_id;
                if mode.filters_lists() && should_filter(&entry.method, filter_resources_list) {
                    apply_list_filter(&mut value, &entry.method, &enforcer);
                }
                if let Err(err) = write_to(&host_writer, &value).await {
                    return BridgeExit::HostError(err);
                }
            }
            ResolveOutcome::Duplicate => {
                debug!(id = %child_id, "dropping duplicate response");
            }
            ResolveOutcome::Spoof => {
                warn!(id = %child_id, "dropping response with unregistered id (spoof or stale)");
            }
        }
    }
}

fn should_filter(method: &str, filter_resources_list: bool) -> bool {
    match method {
        "resources/list" => filter_resources_list,
        other => LIST_METHODS.contains(&other),
    }
}

fn apply_list_filter(value: &mut Value, method: &str, enforcer: &Enforcer) {
    let Some(result) = value.get_mut("result") else {
        return;
    };
    match method {
        "tools/list" => retain_array(result, "tools", |item| {
            item.get("name").and_then(Value::as_str).map(|n| enforcer.allow_tool(n)).unwrap_or(false)
        }),
        "prompts/list" => retain_array(result, "prompts", |item| {
            item.get("name").and_then(Value::as_str).map(|n| enforcer.allow_prompt(n)).unwrap_or(false)
        }),
        "resources/templates/list" => retain_array(result, "resourceTemplates", |item| {
            item.get("uriTemplate")
                .and_then(Value::as_str)
                .map(|t| enforcer.allow_template(t))
                .unwrap_or(false)
        }),
        "resources/list" => retain_array(result, "resources", |item| {
            item.get("uri").and_then(Value::as_str).map(|u| enforcer.allow_resource_uri(u)).unwrap_or(false)
        }),
        _ => {}
    }
}

fn retain_array(result: &mut Value, key: &str, keep: impl Fn(&Value) -> bool) {
    if let Some(array) = result.get_mut(key).and_then(Value::as_array_mut) {
        array.retain(|item| keep(item));
    }
}

/// Returns `Some(reason)` when `method`/`params` name a locked-capability
/// call that the enforcer rejects; `None` when the method isn't one of the
/// three enforced call endpoints, or the call is allowed.
fn outbound_denial_reason(enforcer: &Enforcer, method: &str, params: &Value) -> Option<String> {
    match method {
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            (!enforcer.allow_tool(name)).then(|| format!("tool \"{name}\" not in lockfile allowlist"))
        }
        "prompts/get" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            (!enforcer.allow_prompt(name)).then(|| format!("prompt \"{name}\" not in lockfile allowlist"))
        }
        "resources/read" => {
            let uri = params.get("uri").and_then(Value::as_str).unwrap_or_default();
            (!enforcer.allow_resource_uri(uri)).then(|| format!("resource \"{uri}\" not in lockfile allowlist"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mcptrust_model::{Lockfile, LockfileMeta, Prompts, Resources, ServerInfo, ToolEntry, LOCK_FILE_VERSION};
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;

    fn lockfile_with_tool(tool: &str) -> Lockfile {
        let mut lockfile = Lockfile {
            lock_file_version: LOCK_FILE_VERSION.to_string(),
            meta: LockfileMeta {
                generator: "test".into(),
                updated_at: chrono::Utc::now(),
            },
            server: ServerInfo {
                name: "srv".into(),
                artifact: None,
            },
            prompts: Prompts::default(),
            resources: Resources::default(),
            tools: Default::default(),
            extra: Default::default(),
        };
        lockfile.tools.insert(
            tool.to_string(),
            ToolEntry {
                description_hash: "sha256:".into(),
                input_schema_hash: "sha256:".into(),
                risk_level: "unknown".into(),
            },
        );
        lockfile
    }

    async fn read_json_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Value {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }

    struct Harness {
        host_read: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
        host_write: tokio::io::WriteHalf<tokio::io::DuplexStream>,
        child_read: BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
        child_write: tokio::io::WriteHalf<tokio::io::DuplexStream>,
    }

    fn spawn_bridge(enforcer: Arc<Enforcer>, mode: EnforceMode) -> Harness {
        let (host_side, proxy_host_side) = duplex(8192);
        let (child_side, proxy_child_side) = duplex(8192);
        let (host_read, host_write) = split(host_side);
        let (proxy_host_read, proxy_host_write) = split(proxy_host_side);
        let (proxy_child_read, proxy_child_write) = split(proxy_child_side);
        let (child_read, child_write) = split(child_side);

        let filter = Arc::new(ResponseFilter::new());
        tokio::spawn(bridge(
            BufReader::new(proxy_host_read),
            proxy_host_write,
            BufReader::new(proxy_child_read),
            proxy_child_write,
            enforcer,
            filter,
            BridgeConfig {
                mode,
                filter_resources_list: false,
            },
        ));

        Harness {
            host_read: BufReader::new(host_read),
            host_write,
            child_read: BufReader::new(child_read),
            child_write,
        }
    }

    #[tokio::test]
    async fn s2_filters_tools_list_to_the_locked_allowlist() {
        let lockfile = lockfile_with_tool("safe_tool");
        let enforcer = Arc::new(Enforcer::from_lockfile(&lockfile).unwrap());
        let mut h = spawn_bridge(enforcer, EnforceMode::Enforce);

        h.host_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n")
            .await
            .unwrap();

        let forwarded = read_json_line(&mut h.child_read).await;
        assert_eq!(forwarded["method"], "tools/list");
        let proxy_id = forwarded["id"].clone();

        let response = json!({
            "jsonrpc": "2.0",
            "id": proxy_id,
            "result": {"tools": [{"name": "safe_tool"}, {"name": "debug_exec"}]},
        });
        h.child_write.write_all(format!("{response}\n").as_bytes()).await.unwrap();

        let delivered = read_json_line(&mut h.host_read).await;
        assert_eq!(delivered["id"], json!(1));
        let tools = delivered["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "safe_tool");
    }

    #[tokio::test]
    async fn s3_denies_call_to_an_unlocked_tool_without_reaching_the_child() {
        let lockfile = lockfile_with_tool("safe_tool");
        let enforcer = Arc::new(Enforcer::from_lockfile(&lockfile).unwrap());
        let mut h = spawn_bridge(enforcer, EnforceMode::Enforce);

        h.host_write
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"debug_exec\",\"arguments\":{}}}\n",
            )
            .await
            .unwrap();

        let response = read_json_line(&mut h.host_read).await;
        assert_eq!(response["id"], json!(2));
        assert_eq!(response["error"]["code"], json!(-32001));
        assert_eq!(response["error"]["message"], json!("MCPTRUST_DENIED: tool \"debug_exec\" not in lockfile allowlist"));

        let nothing = tokio::time::timeout(Duration::from_millis(100), h.child_read.fill_buf()).await;
        assert!(nothing.is_err(), "child must never see the denied call");
    }

    #[tokio::test]
    async fn s4_spoofed_response_id_is_never_forwarded() {
        let lockfile = lockfile_with_tool("safe_tool");
        let enforcer = Arc::new(Enforcer::from_lockfile(&lockfile).unwrap());
        let mut h = spawn_bridge(enforcer, EnforceMode::Enforce);

        h.child_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":\"mcp_zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz\",\"result\":{}}\n")
            .await
            .unwrap();

        let nothing = tokio::time::timeout(Duration::from_millis(100), h.host_read.fill_buf()).await;
        assert!(nothing.is_err(), "host must never receive an unregistered response id");
    }

    #[tokio::test]
    async fn audit_only_forwards_denied_calls_and_does_not_filter_lists() {
        let lockfile = lockfile_with_tool("safe_tool");
        let enforcer = Arc::new(Enforcer::from_lockfile(&lockfile).unwrap());
        let mut h = spawn_bridge(enforcer, EnforceMode::AuditOnly);

        h.host_write
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"tools/call\",\"params\":{\"name\":\"debug_exec\",\"arguments\":{}}}\n",
            )
            .await
            .unwrap();

        let forwarded = read_json_line(&mut h.child_read).await;
        assert_eq!(forwarded["method"], "tools/call");
    }
}
