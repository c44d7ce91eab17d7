use std::{
    ffi::OsStr,
    io::{self, ErrorKind},
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::infra::telemetry::millis;

/// Captured output of an external tool that ran to completion.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("`{tool}` is not installed or not on PATH: {source}")]
    NotFound { tool: String, source: io::Error },
    #[error("failed to run `{tool}`: {source}")]
    Spawn { tool: String, source: io::Error },
    #[error("`{tool}` exceeded {limit:?} and was terminated")]
    TimedOut { tool: String, limit: Duration },
}

/// Run `program` in `working_dir`, capturing stdout and stderr.
///
/// The tool runs as the leader of its own process group. The whole group is killed once
/// the tool exits or outlives `limit`. A non-zero exit is not an error here; callers
/// inspect [`ToolOutput::success`].
pub async fn run_external_tool<I, S>(
    program: &Path,
    args: I,
    working_dir: &Path,
    limit: Duration,
) -> Result<ToolOutput, ToolFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = program.display().to_string();
    let started_at = Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|source| {
        warn!(
            target = "application::render::process",
            op = "process::run_external_tool",
            result = "error",
            error_code = "spawn",
            tool = %tool,
            error = %source,
            "Failed to spawn external tool"
        );
        if source.kind() == ErrorKind::NotFound {
            ToolFailure::NotFound {
                tool: tool.clone(),
                source,
            }
        } else {
            ToolFailure::Spawn {
                tool: tool.clone(),
                source,
            }
        }
    })?;

    let group = ProcessGroup::of(&child);
    // Dropping the pending future on expiry drops the child, which kills it; the group
    // kill then reaches anything it started.
    let waited = tokio::time::timeout(limit, child.wait_with_output()).await;
    group.kill(&tool);

    let output = match waited {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => return Err(ToolFailure::Spawn { tool, source }),
        Err(_) => {
            warn!(
                target = "application::render::process",
                op = "process::run_external_tool",
                result = "timeout",
                elapsed_ms = millis(started_at.elapsed()),
                limit_ms = millis(limit),
                tool = %tool,
                "External tool timed out and was terminated"
            );
            return Err(ToolFailure::TimedOut { tool, limit });
        }
    };

    let exit_code = output.status.code();
    let result = if output.status.success() {
        "ok"
    } else {
        "exit_failure"
    };
    debug!(
        target = "application::render::process",
        op = "process::run_external_tool",
        result,
        elapsed_ms = millis(started_at.elapsed()),
        exit_code = exit_code.map(i64::from).unwrap_or(-1),
        tool = %tool,
        "External tool finished"
    );

    Ok(ToolOutput {
        exit_code,
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Process group led by a spawned tool, so descendants started with `--shell-escape`
/// are signalled along with it.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self(child.id())
    }

    #[cfg(unix)]
    fn kill(&self, tool: &str) {
        use nix::{
            errno::Errno,
            sys::signal::{Signal, killpg},
            unistd::Pid,
        };

        let Some(pgid) = self.0.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => debug!(
                target = "application::render::process",
                op = "process::kill_group",
                result = "error",
                pgid,
                tool = %tool,
                error = %err,
                "Failed to signal tool process group"
            ),
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, _tool: &str) {}
}
