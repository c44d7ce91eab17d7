use std::{
    ffi::OsString,
    io,
    num::NonZeroU32,
    path::PathBuf,
    time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::infra::telemetry::millis;

use super::{
    error::{RenderError, Stage},
    process::run_external_tool,
    workspace::Workspace,
};

/// How the LaTeX compiler is invoked.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub program: PathBuf,
    pub timeout: Duration,
    pub attempts: NonZeroU32,
    pub backoff: Duration,
}

/// Outcome of the final compiler attempt, before classification.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub exit_succeeded: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub artifact_exists: bool,
    pub attempts: u32,
}

impl CompilationResult {
    /// Turn a finished compilation into the path of its PDF, or the matching failure.
    ///
    /// A clean exit without a PDF is its own failure; the compiler family is known to
    /// exit 0 after swallowing some errors.
    pub fn into_artifact(self, workspace: &Workspace) -> Result<PathBuf, RenderError> {
        if !self.exit_succeeded {
            return Err(RenderError::Compilation {
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        if !self.artifact_exists {
            return Err(RenderError::MissingArtifact {
                stage: Stage::Compile,
                stdout: self.stdout,
            });
        }
        Ok(workspace.compiled_document())
    }
}

/// Write `document` into the workspace and compile it, retrying failed exits.
///
/// Timeouts and missing binaries are returned immediately; only non-zero exits are
/// retried, after a fixed backoff.
pub async fn compile(
    config: &CompilerConfig,
    document: &str,
    workspace: &Workspace,
) -> Result<CompilationResult, RenderError> {
    let input = workspace.input_document();
    tokio::fs::write(&input, document).await?;

    let args: Vec<OsString> = vec![
        "--shell-escape".into(),
        "-interaction=nonstopmode".into(),
        "-output-directory".into(),
        workspace.path().into(),
        input.into(),
    ];

    let max_attempts = config.attempts.get();
    let started_at = Instant::now();
    let mut attempt = 1;
    let output = loop {
        discard_stale_document(workspace).await?;
        metrics::counter!("texrender_compile_attempts_total").increment(1);
        let output = run_external_tool(&config.program, &args, workspace.path(), config.timeout)
            .await
            .map_err(|failure| RenderError::from_tool(Stage::Compile, failure))?;

        if output.success || attempt >= max_attempts {
            break output;
        }

        warn!(
            target = "application::render::compiler",
            op = "compiler::compile",
            result = "retry",
            attempt,
            max_attempts,
            exit_code = output.exit_code.map(i64::from).unwrap_or(-1),
            backoff_ms = millis(config.backoff),
            "Compiler failed; retrying after backoff"
        );
        tokio::time::sleep(config.backoff).await;
        attempt += 1;
    };

    let artifact_exists = tokio::fs::try_exists(workspace.compiled_document())
        .await
        .unwrap_or(false);

    let result = if output.success { "ok" } else { "exit_failure" };
    info!(
        target = "application::render::compiler",
        op = "compiler::compile",
        result,
        attempts = attempt,
        elapsed_ms = millis(started_at.elapsed()),
        artifact_exists,
        "Compiler finished"
    );

    Ok(CompilationResult {
        exit_succeeded: output.success,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        artifact_exists,
        attempts: attempt,
    })
}

/// Remove a PDF left behind by an earlier attempt so the post-condition only sees this run.
async fn discard_stale_document(workspace: &Workspace) -> Result<(), RenderError> {
    match tokio::fs::remove_file(workspace.compiled_document()).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RenderError::from(err)),
    }
}
