#![cfg(unix)]

use std::{
    collections::HashSet, num::NonZeroU32, os::unix::fs::PermissionsExt, path::Path,
    time::Duration,
};

use axum::http::StatusCode;
use metrics_util::debugging::DebuggingRecorder;
use tempfile::TempDir;
use texrender::{
    application::render::{CompilerConfig, ConverterConfig, RenderPipelineConfig, RenderService},
    domain::request::{OutputFormat, RenderRequest},
    infra::telemetry,
};

fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut permissions = std::fs::metadata(&path).expect("metadata").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("chmod");
    path
}

#[tokio::test]
async fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let tools = TempDir::new().expect("tools");
    let compiler = write_script(
        tools.path(),
        "lualatex",
        r#"
outdir=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -output-directory) shift; outdir="$1" ;;
  esac
  shift
done
printf '%%PDF-1.5\n' > "$outdir/input.pdf"
"#,
    );
    let converter = write_script(
        tools.path(),
        "pdftocairo",
        "for arg in \"$@\"; do last=\"$arg\"; done\nprintf '<svg/>' > \"$last\"\n",
    );

    let service = RenderService::new(RenderPipelineConfig {
        compiler: CompilerConfig {
            program: compiler,
            timeout: Duration::from_secs(5),
            attempts: NonZeroU32::new(2).expect("non-zero"),
            backoff: Duration::from_millis(10),
        },
        converter: ConverterConfig {
            program: converter,
            timeout: Duration::from_secs(5),
            png_resolution_dpi: 300,
        },
        workspace_root: None,
        max_concurrent: NonZeroU32::new(1).expect("non-zero"),
        compile_failure_status: StatusCode::BAD_REQUEST,
    });

    let ok = RenderRequest::new("$x$", OutputFormat::Svg).expect("request");
    service.render(&ok).await.expect("rendered");

    let rejected =
        RenderRequest::new(r"\tkzTabInit{$x$ /1}{$0$}", OutputFormat::Svg).expect("request");
    service.render(&rejected).await.expect_err("rejected");

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for metric in [
        "texrender_render_total",
        "texrender_render_ms",
        "texrender_compile_attempts_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcomes: HashSet<String> = snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == "texrender_render_total")
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .filter(|label| label.key() == "outcome")
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(outcomes.contains("success"), "{outcomes:?}");
    assert!(outcomes.contains("validation"), "{outcomes:?}");
}
