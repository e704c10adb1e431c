use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use mcptrust_enforcer::Enforcer;
use mcptrust_model::Lockfile;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tracing::{error, info};

use crate::bridge::{bridge, BridgeConfig, BridgeExit};
use crate::error::ProxyError;
use crate::filter::ResponseFilter;
use crate::mode::EnforceMode;
use crate::preflight::{run_preflight, PreflightConfig};

/// Grace window given to the child after the bridge stops before it is
/// hard-killed, matching the scanner's shutdown contract (§4.3, §4.9).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct ProxyOptions {
    pub program: String,
    pub args: Vec<String>,
    pub mode: EnforceMode,
    pub preflight: PreflightConfig,
}

/// Runs preflight against `program args...`, then spawns it for real and
/// bridges the process's own stdio to the child's, returning the process
/// exit code (0 on a clean EOF, per §4.9).
pub async fn run_proxy(lockfile: &Lockfile, options: ProxyOptions) -> Result<i32, ProxyError> {
    let enforcer = Arc::new(Enforcer::from_lockfile(lockfile)?);
    let filter_resources_list = options.preflight.allow_static_resources;

    let outcome = run_preflight(
        lockfile,
        &enforcer,
        &options.program,
        &options.args,
        &options.preflight,
        options.mode,
    )
    .await?;
    info!(
        max_severity = ?outcome.drift.max_severity(),
        "preflight passed, bridging to child"
    );

    let mut child = Command::new(&options.program)
        .args(&options.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProxyError::Io { side: "spawn", source })?;

    let child_stdin = child.stdin.take().expect("stdin was piped");
    let child_stdout = child.stdout.take().expect("stdout was piped");

    let filter = Arc::new(ResponseFilter::new());
    let config = BridgeConfig {
        mode: options.mode,
        filter_resources_list,
    };

    let exit = bridge(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        BufReader::new(child_stdout),
        child_stdin,
        enforcer,
        filter,
        config,
    )
    .await;

    if !exit.is_clean() {
        error!(?exit, "bridge torn down by an unrecoverable error");
    }

    Ok(shutdown(&mut child).await)
}

async fn shutdown(child: &mut Child) -> i32 {
    drop(child.stdin.take());
    match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
        Ok(Ok(status)) => status.code().unwrap_or(0),
        Ok(Err(_)) => 1,
        Err(_) => {
            let _ = child.kill().await;
            1
        }
    }
}
