use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command as TokioCommand;

use crate::error::RunnerError;

/// Argv-only process specification: no implementation reachable from this
/// crate ever builds a shell string. Mirrors the teacher's `CommandSpec`
/// builder, narrowed to what the runner needs (no `ProcessRunner` trait —
/// there is exactly one execution backend here, the OS process table).
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<OsString, OsString>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn to_tokio_command(&self) -> TokioCommand {
        let mut command = TokioCommand::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }

    /// Runs the command with output captured (used for install steps, where
    /// the runner inspects exit status rather than streaming to the host).
    pub async fn run_captured(&self) -> Result<std::process::Output, RunnerError> {
        let output = self
            .to_tokio_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }

    /// Runs the command inheriting the host's stdio (used for final server
    /// execution, §4.7 step 10 / OCI runner — the launched MCP server speaks
    /// JSON-RPC directly over this process's stdin/stdout).
    pub async fn run_inherited(&self) -> Result<std::process::ExitStatus, RunnerError> {
        let status = self
            .to_tokio_command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_args_as_discrete_elements() {
        let cmd = CommandSpec::new("npm").arg("install").args(["--ignore-scripts", "./pkg.tgz"]);
        assert_eq!(cmd.program, OsString::from("npm"));
        assert_eq!(cmd.args.len(), 3);
    }
}
