use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use mcptrust_model::{
    ScanReport, ScannedPrompt, ScannedPromptArgument, ScannedResource, ScannedServerInfo,
    ScannedTemplate, ScannedTool,
};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::process::{Child, Command};

use crate::error::ScanError;
use crate::jsonrpc::JsonRpcClient;
use crate::paginate::paginate;

/// The whole scan runs under a single deadline (default 10s, §4.3).
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace window given to the child after stdin is closed before it is
/// hard-killed (§4.3).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Spawns an MCP server child process and enumerates its advertised
/// capability surface (component C3).
pub struct Scanner {
    pub timeout: Duration,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl Scanner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Spawns `program args...` and runs the full handshake-and-enumerate
    /// sequence against it, returning a deterministically-sorted
    /// [`ScanReport`].
    pub async fn scan(&self, program: &str, args: &[String]) -> Result<ScanReport, ScanError> {
        let command_text = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");
        let mut client = JsonRpcClient::new(BufReader::new(stdout), stdin);

        let outcome = tokio::time::timeout(self.timeout, run_handshake(&mut client, &command_text)).await;

        shutdown(&mut child).await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(self.timeout)),
        }
    }
}

async fn run_handshake<R, W>(
    client: &mut JsonRpcClient<R, W>,
    command: &str,
) -> Result<ScanReport, ScanError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let init_result = client
        .request(
            "initialize",
            Some(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "mcptrust", "version": env!("CARGO_PKG_VERSION")},
            })),
        )
        .await?;
    client.notify("notifications/initialized", None).await?;

    let server_info: Option<ScannedServerInfo> = init_result
        .get("serverInfo")
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    let tools = collect_tools(client).await?;
    let resources = collect_resources(client).await;
    let prompts = collect_prompts(client).await?;
    let resource_templates = collect_templates(client).await?;

    let mut report = ScanReport {
        timestamp: Utc::now(),
        command: command.to_string(),
        server_info,
        tools,
        resources,
        prompts,
        resource_templates,
        error: None,
    };
    report.sort_deterministically();
    Ok(report)
}

async fn collect_tools<R, W>(client: &mut JsonRpcClient<R, W>) -> Result<Vec<ScannedTool>, ScanError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let result = client.request("tools/list", None).await?;
    let raw = result.get("tools").and_then(Value::as_array).cloned().unwrap_or_default();
    raw.into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| ScanError::Parse(e.to_string())))
        .collect()
}

async fn collect_resources<R, W>(client: &mut JsonRpcClient<R, W>) -> Vec<ScannedResource>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    // "resources/list (treat errors as empty)" — unconditionally, not just
    // on method-not-found (§4.3).
    match client.request("resources/list", None).await {
        Ok(result) => result
            .get("resources")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

async fn collect_prompts<R, W>(client: &mut JsonRpcClient<R, W>) -> Result<Vec<ScannedPrompt>, ScanError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let raw = paginate(client, "prompts/list", |v| {
        v.get("prompts").and_then(Value::as_array).cloned().unwrap_or_default()
    })
    .await?;

    raw.into_iter()
        .map(|v| {
            let name = v
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let description = v.get("description").and_then(Value::as_str).map(str::to_string);
            let arguments = v
                .get("arguments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|a| {
                    serde_json::from_value::<ScannedPromptArgument>(a)
                        .map_err(|e| ScanError::Parse(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ScannedPrompt {
                name,
                description,
                arguments,
            })
        })
        .collect()
}

async fn collect_templates<R, W>(
    client: &mut JsonRpcClient<R, W>,
) -> Result<Vec<ScannedTemplate>, ScanError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let raw = paginate(client, "resources/templates/list", |v| {
        v.get("resourceTemplates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    })
    .await?;

    raw.into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| ScanError::Parse(e.to_string())))
        .collect()
}

async fn shutdown(child: &mut Child) {
    drop(child.stdin.take());
    match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            let _ = child.kill().await;
        }
    }
}
