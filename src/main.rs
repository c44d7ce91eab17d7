use std::{path::Path, process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use texrender::{
    application::{
        error::AppError,
        keepalive::{KeepAliveContext, process_keep_alive_ping},
        render::{RenderError, RenderPipelineConfig, RenderService},
    },
    config::{self, KeepAliveSettings, RenderArgs},
    domain::request::{RenderRequest, RequestedFormat},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args.command.unwrap_or(config::Command::Serve);

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    let render = Arc::new(RenderService::new(RenderPipelineConfig::from(
        &settings.render,
    )));

    match command {
        config::Command::Serve => run_serve(settings, render).await,
        config::Command::Render(args) => run_render(render, args).await,
    }
}

async fn run_serve(settings: config::Settings, render: Arc<RenderService>) -> Result<(), AppError> {
    let monitor_handle = match settings.keep_alive.as_ref() {
        Some(keep_alive) => Some(spawn_keep_alive_monitor(keep_alive)?),
        None => {
            info!(
                target = "texrender::keepalive",
                "Keep-alive disabled; no external URL configured"
            );
            None
        }
    };

    let result = serve_http(&settings, HttpState { render }).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

fn spawn_keep_alive_monitor(
    settings: &KeepAliveSettings,
) -> Result<tokio::task::JoinHandle<()>, AppError> {
    let context = KeepAliveContext::new(settings.target.clone(), settings.request_timeout)
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let worker = WorkerBuilder::new("keep-alive-ping")
        .data(context)
        .backend(CronStream::new_with_timezone(
            settings.schedule.clone(),
            settings.timezone,
        ))
        .build_fn(process_keep_alive_ping);

    let monitor = Monitor::new().register(worker);

    info!(
        target = "texrender::keepalive",
        url = %settings.target,
        timezone = %settings.timezone,
        "Keep-alive scheduler started"
    );

    Ok(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "keep-alive monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state, &settings.cors);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "texrender::http",
        addr = %settings.server.addr,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "texrender::http", "Shutdown signal received");
}

async fn run_render(render: Arc<RenderService>, args: RenderArgs) -> Result<(), AppError> {
    let markup = read_input(&args.input).await?;

    let result = match RenderRequest::parse(Some(&markup), RequestedFormat::Named(&args.format)) {
        Ok(request) => render.render(&request).await,
        Err(err) => Err(RenderError::from(err)),
    };

    let image = match result {
        Ok(image) => image,
        Err(err) => {
            let failure = render.classify(&err, &markup);
            eprintln!("{}", failure.message);
            if let Some(details) = failure.details.as_deref() {
                eprintln!("{details}");
            }
            return Err(AppError::from(err));
        }
    };

    match args.output.as_deref() {
        Some(path) => tokio::fs::write(path, image.artifact.as_bytes())
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(image.artifact.as_bytes())
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            stdout
                .flush()
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    Ok(())
}

async fn read_input(path: &Path) -> Result<String, AppError> {
    if path == Path::new("-") {
        let mut markup = String::new();
        tokio::io::stdin()
            .read_to_string(&mut markup)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        return Ok(markup);
    }

    tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::validation(format!("failed to read `{}`: {err}", path.display()))
    })
}
