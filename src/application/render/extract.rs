use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tracing::info;

use crate::{domain::request::OutputFormat, infra::telemetry::millis};

use super::{
    error::{RenderError, Stage},
    process::run_external_tool,
    workspace::Workspace,
};

/// How the PDF-to-image converter is invoked.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub program: PathBuf,
    pub timeout: Duration,
    pub png_resolution_dpi: u32,
}

/// Bytes read back from the converted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Text(String),
    Binary(Vec<u8>),
}

impl Artifact {
    pub fn len(&self) -> usize {
        match self {
            Artifact::Text(text) => text.len(),
            Artifact::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Artifact::Text(text) => text.as_bytes(),
            Artifact::Binary(bytes) => bytes.as_slice(),
        }
    }
}

fn converter_args(
    config: &ConverterConfig,
    format: OutputFormat,
    pdf: &Path,
    workspace: &Workspace,
) -> Vec<OsString> {
    match format {
        OutputFormat::Svg => vec![
            "-svg".into(),
            pdf.into(),
            workspace.artifact(OutputFormat::Svg).into(),
        ],
        // With -singlefile the converter appends `.png` to the output root itself.
        OutputFormat::Png => vec![
            "-png".into(),
            "-singlefile".into(),
            "-r".into(),
            config.png_resolution_dpi.to_string().into(),
            pdf.into(),
            workspace.artifact_root().into(),
        ],
    }
}

/// Convert the compiled PDF into `format` and read the artifact back.
pub async fn extract(
    config: &ConverterConfig,
    pdf: &Path,
    format: OutputFormat,
    workspace: &Workspace,
) -> Result<Artifact, RenderError> {
    let started_at = Instant::now();
    let args = converter_args(config, format, pdf, workspace);

    let output = run_external_tool(&config.program, &args, workspace.path(), config.timeout)
        .await
        .map_err(|failure| RenderError::from_tool(Stage::Convert, failure))?;

    if !output.success {
        return Err(RenderError::Conversion {
            exit_code: output.exit_code,
            output: format!("Stderr: {}\nStdout: {}", output.stderr, output.stdout),
        });
    }

    let path = workspace.artifact(format);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(RenderError::MissingArtifact {
            stage: Stage::Convert,
            stdout: output.stdout,
        });
    }

    let artifact = if format.is_vector() {
        let text = tokio::fs::read_to_string(&path).await?;
        Artifact::Text(text)
    } else {
        Artifact::Binary(tokio::fs::read(&path).await?)
    };

    info!(
        target = "application::render::extract",
        op = "extract::extract",
        result = "ok",
        format = format.as_str(),
        elapsed_ms = millis(started_at.elapsed()),
        artifact_bytes = artifact.len(),
        "Converted PDF to image"
    );

    Ok(artifact)
}
