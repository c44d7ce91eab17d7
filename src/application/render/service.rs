use std::{num::NonZeroU32, path::PathBuf, sync::Arc, time::Instant};

use axum::http::StatusCode;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::{
    config::RenderSettings,
    domain::request::{OutputFormat, RenderRequest},
    infra::telemetry::millis,
};

use super::{
    compiler::{self, CompilerConfig},
    document,
    encode::{self, ImagePayload},
    error::{ErrorKind, RenderError, RenderFailure},
    extract::{self, Artifact, ConverterConfig},
    workspace::Workspace,
};

/// Static configuration of the render pipeline, fixed at startup.
#[derive(Debug, Clone)]
pub struct RenderPipelineConfig {
    pub compiler: CompilerConfig,
    pub converter: ConverterConfig,
    pub workspace_root: Option<PathBuf>,
    pub max_concurrent: NonZeroU32,
    pub compile_failure_status: StatusCode,
}

impl From<&RenderSettings> for RenderPipelineConfig {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            compiler: CompilerConfig {
                program: settings.compiler_path.clone(),
                timeout: settings.compile_timeout,
                attempts: settings.compile_attempts,
                backoff: settings.retry_backoff,
            },
            converter: ConverterConfig {
                program: settings.converter_path.clone(),
                timeout: settings.convert_timeout,
                png_resolution_dpi: settings.png_resolution_dpi.get(),
            },
            workspace_root: settings.workspace_root.clone(),
            max_concurrent: settings.max_concurrent,
            compile_failure_status: settings.compile_failure_status,
        }
    }
}

/// A successfully rendered artifact.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub format: OutputFormat,
    pub artifact: Artifact,
}

impl RenderedImage {
    pub fn payload(&self) -> ImagePayload {
        encode::encode(&self.artifact, self.format)
    }
}

/// Runs the markup → PDF → image pipeline, one isolated workspace per call.
///
/// Concurrent renders are bounded by a semaphore; excess callers wait for a permit.
#[derive(Debug, Clone)]
pub struct RenderService {
    config: Arc<RenderPipelineConfig>,
    permits: Arc<Semaphore>,
}

impl RenderService {
    pub fn new(config: RenderPipelineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.get() as usize));
        Self {
            config: Arc::new(config),
            permits,
        }
    }

    /// Classify a failure using this deployment's status policy.
    pub fn classify(&self, err: &RenderError, markup: &str) -> RenderFailure {
        err.classify(markup, self.config.compile_failure_status)
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderedImage, RenderError> {
        let started_at = Instant::now();
        let result = self.run(request).await;
        let elapsed_ms = millis(started_at.elapsed());

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind().as_str(),
        };
        metrics::counter!("texrender_render_total", "outcome" => outcome).increment(1);
        metrics::histogram!("texrender_render_ms").record(elapsed_ms as f64);

        match &result {
            Ok(image) => info!(
                target = "application::render::service",
                op = "render::render",
                result = "ok",
                format = image.format.as_str(),
                elapsed_ms,
                markup_bytes = request.markup().len(),
                artifact_bytes = image.artifact.len(),
                "Rendered markup"
            ),
            Err(err) => self.log_failure(err, request, elapsed_ms),
        }

        result
    }

    async fn run(&self, request: &RenderRequest) -> Result<RenderedImage, RenderError> {
        // Heuristic rejection happens before any permit, workspace, or process.
        let source = document::assemble(request.markup())?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RenderError::unexpected("render queue is closed"))?;

        let workspace = Workspace::create(self.config.workspace_root.as_deref())?;
        let result = self.run_in(&workspace, &source, request.format()).await;
        workspace.close();
        result
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        source: &str,
        format: OutputFormat,
    ) -> Result<RenderedImage, RenderError> {
        let compilation = compiler::compile(&self.config.compiler, source, workspace).await?;
        let pdf = compilation.into_artifact(workspace)?;
        let artifact = extract::extract(&self.config.converter, &pdf, format, workspace).await?;
        Ok(RenderedImage { format, artifact })
    }

    fn log_failure(&self, err: &RenderError, request: &RenderRequest, elapsed_ms: u64) {
        let failure = self.classify(err, request.markup());
        let details = failure.details.as_deref().unwrap_or("");
        if failure.kind == ErrorKind::Validation {
            warn!(
                target = "application::render::service",
                op = "render::render",
                result = "rejected",
                error_code = failure.kind.as_str(),
                elapsed_ms,
                error = %err,
                "Render request rejected"
            );
            return;
        }

        error!(
            target = "application::render::service",
            op = "render::render",
            result = "error",
            error_code = failure.kind.as_str(),
            status = failure.status.as_u16(),
            format = request.format().as_str(),
            elapsed_ms,
            error = %err,
            details = %details,
            input = %request.markup(),
            "Render failed"
        );
    }
}
