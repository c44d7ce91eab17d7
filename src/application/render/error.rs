//! Failure taxonomy for the render pipeline and its mapping onto user-facing responses.

use std::{fmt, io, time::Duration};

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::error::ValidationError;

use super::process::ToolFailure;

/// Pipeline step that invoked an external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Convert,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Convert => "convert",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("compiler exited with status {}", display_exit(.exit_code))]
    Compilation {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("{stage} step timed out after {}s", .limit.as_secs())]
    Timeout { stage: Stage, limit: Duration },
    #[error("{stage} step exited cleanly but produced no output file")]
    MissingArtifact { stage: Stage, stdout: String },
    #[error("converter exited with status {}", display_exit(.exit_code))]
    Conversion {
        exit_code: Option<i32>,
        output: String,
    },
    #[error("{stage} tool unavailable: {source}")]
    ToolUnavailable { stage: Stage, source: ToolFailure },
    #[error("workspace i/o failed: {0}")]
    Workspace(#[from] io::Error),
    #[error("{0}")]
    Unexpected(String),
}

/// Coarse failure categories callers use to choose between "fix your markup" and
/// "try again later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Compilation,
    Timeout,
    ToolFault,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Compilation => "compilation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ToolFault => "tool_fault",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl RenderError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Map a tool-level failure from `stage` onto the pipeline taxonomy.
    pub(crate) fn from_tool(stage: Stage, failure: ToolFailure) -> Self {
        match failure {
            ToolFailure::TimedOut { limit, .. } => RenderError::Timeout { stage, limit },
            other => RenderError::ToolUnavailable {
                stage,
                source: other,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Validation(_) => ErrorKind::Validation,
            RenderError::Compilation { .. } => ErrorKind::Compilation,
            RenderError::Timeout { .. } => ErrorKind::Timeout,
            RenderError::MissingArtifact { .. }
            | RenderError::Conversion { .. }
            | RenderError::ToolUnavailable { .. } => ErrorKind::ToolFault,
            RenderError::Workspace(_) | RenderError::Unexpected(_) => ErrorKind::Unknown,
        }
    }

    /// Produce the response shape for this failure. `compile_failure_status` is the
    /// deployment's policy for non-zero compiler exits (400 or 500).
    pub fn classify(&self, markup: &str, compile_failure_status: StatusCode) -> RenderFailure {
        let kind = self.kind();
        match self {
            RenderError::Validation(err) => RenderFailure {
                kind,
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
                details: None,
            },
            RenderError::Compilation {
                exit_code,
                stdout,
                stderr,
            } => RenderFailure {
                kind,
                status: compile_failure_status,
                message: "LaTeX compilation failed. Check your LaTeX syntax.".to_string(),
                details: Some(format!(
                    "Process failed with exit code {}.\nStderr: {stderr}\nStdout: {stdout}",
                    display_exit(exit_code)
                )),
            },
            RenderError::Timeout { stage, limit } => RenderFailure {
                kind,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!(
                    "Process timed out after {} seconds. Try simplifying the LaTeX code.",
                    limit.as_secs()
                ),
                details: Some(format!(
                    "Stage: {stage}. Timeout: {}s",
                    limit.as_secs()
                )),
            },
            RenderError::MissingArtifact { stage, stdout } => RenderFailure {
                kind,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: match stage {
                    Stage::Compile => "PDF file was not created by the LaTeX compiler.",
                    Stage::Convert => "Image file was not created by the converter.",
                }
                .to_string(),
                details: Some(format!("Stdout: {stdout}")),
            },
            RenderError::Conversion { exit_code, output } => RenderFailure {
                kind,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Image conversion failed.".to_string(),
                details: Some(format!(
                    "Process failed with exit code {}.\n{output}",
                    display_exit(exit_code)
                )),
            },
            RenderError::ToolUnavailable { source, .. } => RenderFailure {
                kind,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Rendering toolchain is unavailable.".to_string(),
                details: Some(source.to_string()),
            },
            RenderError::Workspace(_) | RenderError::Unexpected(_) => RenderFailure {
                kind,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Unexpected error: {self}"),
                details: Some(markup.to_string()),
            },
        }
    }
}

/// Classified failure ready to be placed in a response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

fn display_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |code| code.to_string())
}
