//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use apalis_cron::Schedule;
use axum::http::{HeaderValue, StatusCode};
use chrono_tz::Tz;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::keepalive::parse_schedule;

pub use cli::{CliArgs, Command, Overrides, RenderArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "texrender";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "https://trolytoanai.edu.vn"];
const DEFAULT_COMPILER_PATH: &str = "lualatex";
const DEFAULT_CONVERTER_PATH: &str = "pdftocairo";
const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 180;
const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COMPILE_ATTEMPTS: u32 = 2;
const MAX_COMPILE_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
const DEFAULT_PNG_RESOLUTION_DPI: u32 = 300;
const DEFAULT_MAX_CONCURRENT: u32 = 4;
const DEFAULT_COMPILE_FAILURE_STATUS: u16 = 400;
const DEFAULT_KEEP_ALIVE_SCHEDULE: &str = "0 */14 7-23 * * *";
const DEFAULT_KEEP_ALIVE_TIMEZONE: &str = "Asia/Ho_Chi_Minh";
const DEFAULT_KEEP_ALIVE_TIMEOUT_SECS: u64 = 10;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cors: CorsSettings,
    pub render: RenderSettings,
    /// Present exactly when an external URL is configured.
    pub keep_alive: Option<KeepAliveSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub external_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub allowed_origins: Vec<HeaderValue>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub compiler_path: PathBuf,
    pub converter_path: PathBuf,
    pub compile_timeout: Duration,
    pub convert_timeout: Duration,
    pub compile_attempts: NonZeroU32,
    pub retry_backoff: Duration,
    pub png_resolution_dpi: NonZeroU32,
    pub max_concurrent: NonZeroU32,
    pub workspace_root: Option<PathBuf>,
    pub compile_failure_status: StatusCode,
}

#[derive(Debug, Clone)]
pub struct KeepAliveSettings {
    pub target: Url,
    pub schedule: Schedule,
    pub timezone: Tz,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("TEXRENDER").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cors: RawCorsSettings,
    render: RawRenderSettings,
    keep_alive: RawKeepAliveSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(url) = overrides.external_url.as_ref() {
            self.server.external_url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.compiler_path.as_ref() {
            self.render.compiler_path = Some(path.clone());
        }
        if let Some(path) = overrides.converter_path.as_ref() {
            self.render.converter_path = Some(path.clone());
        }
        if let Some(seconds) = overrides.compile_timeout_seconds {
            self.render.compile_timeout_seconds = Some(seconds);
        }
        if let Some(count) = overrides.max_concurrent {
            self.render.max_concurrent = Some(count);
        }
        if let Some(root) = overrides.workspace_root.as_ref() {
            self.render.workspace_root = Some(root.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cors,
            render,
            keep_alive,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let cors = build_cors_settings(cors)?;
        let render = build_render_settings(render)?;
        let keep_alive = build_keep_alive_settings(keep_alive, server.external_url.as_ref())?;

        Ok(Self {
            server,
            logging,
            cors,
            render,
            keep_alive,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let external_url = match server.external_url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => {
            let url = Url::parse(value).map_err(|err| {
                LoadError::invalid("server.external_url", format!("invalid url: {err}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "server.external_url",
                    "scheme must be http or https",
                ));
            }
            Some(url)
        }
    };

    Ok(ServerSettings { addr, external_url })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cors_settings(cors: RawCorsSettings) -> Result<CorsSettings, LoadError> {
    let origins = cors.allowed_origins.unwrap_or_else(|| {
        DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|origin| origin.to_string())
            .collect()
    });

    let allowed_origins = origins
        .iter()
        .map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                return Err(LoadError::invalid(
                    "cors.allowed_origins",
                    "origin must not be empty",
                ));
            }
            HeaderValue::from_str(trimmed).map_err(|err| {
                LoadError::invalid(
                    "cors.allowed_origins",
                    format!("invalid origin `{trimmed}`: {err}"),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsSettings { allowed_origins })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let compiler_path = non_empty_path(
        render.compiler_path,
        DEFAULT_COMPILER_PATH,
        "render.compiler_path",
    )?;
    let converter_path = non_empty_path(
        render.converter_path,
        DEFAULT_CONVERTER_PATH,
        "render.converter_path",
    )?;

    let compile_timeout_secs = render
        .compile_timeout_seconds
        .unwrap_or(DEFAULT_COMPILE_TIMEOUT_SECS);
    if compile_timeout_secs == 0 {
        return Err(LoadError::invalid(
            "render.compile_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let convert_timeout_secs = render
        .convert_timeout_seconds
        .unwrap_or(DEFAULT_CONVERT_TIMEOUT_SECS);
    if convert_timeout_secs == 0 {
        return Err(LoadError::invalid(
            "render.convert_timeout_seconds",
            "must be greater than zero",
        ));
    }
    if convert_timeout_secs > compile_timeout_secs {
        return Err(LoadError::invalid(
            "render.convert_timeout_seconds",
            "must not exceed render.compile_timeout_seconds",
        ));
    }

    let attempts = render.compile_attempts.unwrap_or(DEFAULT_COMPILE_ATTEMPTS);
    if attempts > MAX_COMPILE_ATTEMPTS {
        return Err(LoadError::invalid(
            "render.compile_attempts",
            format!("must be at most {MAX_COMPILE_ATTEMPTS}"),
        ));
    }
    let compile_attempts = non_zero_u32(attempts.into(), "render.compile_attempts")?;

    let retry_backoff =
        Duration::from_millis(render.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS));

    let png_resolution_dpi = non_zero_u32(
        render
            .png_resolution_dpi
            .unwrap_or(DEFAULT_PNG_RESOLUTION_DPI)
            .into(),
        "render.png_resolution_dpi",
    )?;
    let max_concurrent = non_zero_u32(
        render
            .max_concurrent
            .unwrap_or(DEFAULT_MAX_CONCURRENT)
            .into(),
        "render.max_concurrent",
    )?;

    let workspace_root = match render.workspace_root {
        Some(root) if root.as_os_str().is_empty() => None,
        other => other,
    };

    let compile_failure_status = match render
        .compile_failure_status
        .unwrap_or(DEFAULT_COMPILE_FAILURE_STATUS)
    {
        400 => StatusCode::BAD_REQUEST,
        500 => StatusCode::INTERNAL_SERVER_ERROR,
        other => {
            return Err(LoadError::invalid(
                "render.compile_failure_status",
                format!("must be 400 or 500, got {other}"),
            ));
        }
    };

    Ok(RenderSettings {
        compiler_path,
        converter_path,
        compile_timeout: Duration::from_secs(compile_timeout_secs),
        convert_timeout: Duration::from_secs(convert_timeout_secs),
        compile_attempts,
        retry_backoff,
        png_resolution_dpi,
        max_concurrent,
        workspace_root,
        compile_failure_status,
    })
}

fn build_keep_alive_settings(
    keep_alive: RawKeepAliveSettings,
    external_url: Option<&Url>,
) -> Result<Option<KeepAliveSettings>, LoadError> {
    let expression = keep_alive
        .schedule
        .unwrap_or_else(|| DEFAULT_KEEP_ALIVE_SCHEDULE.to_string());
    let schedule = parse_schedule(&expression)
        .map_err(|reason| LoadError::invalid("keep_alive.schedule", reason))?;

    let zone = keep_alive
        .timezone
        .unwrap_or_else(|| DEFAULT_KEEP_ALIVE_TIMEZONE.to_string());
    let timezone: Tz = zone.parse().map_err(|err| {
        LoadError::invalid("keep_alive.timezone", format!("unknown zone `{zone}`: {err}"))
    })?;

    let timeout_secs = keep_alive
        .request_timeout_seconds
        .unwrap_or(DEFAULT_KEEP_ALIVE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "keep_alive.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let Some(external_url) = external_url else {
        return Ok(None);
    };

    Ok(Some(KeepAliveSettings {
        target: keep_alive_target(external_url)?,
        schedule,
        timezone,
        request_timeout: Duration::from_secs(timeout_secs),
    }))
}

/// The liveness endpoint under the external base URL.
fn keep_alive_target(external_url: &Url) -> Result<Url, LoadError> {
    let base = external_url.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}/"))
        .map_err(|err| LoadError::invalid("server.external_url", format!("invalid url: {err}")))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    external_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCorsSettings {
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    compiler_path: Option<PathBuf>,
    converter_path: Option<PathBuf>,
    compile_timeout_seconds: Option<u64>,
    convert_timeout_seconds: Option<u64>,
    compile_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    png_resolution_dpi: Option<u32>,
    max_concurrent: Option<u32>,
    workspace_root: Option<PathBuf>,
    compile_failure_status: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKeepAliveSettings {
    schedule: Option<String>,
    timezone: Option<String>,
    request_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
