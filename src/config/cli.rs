use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the texrender binary.
#[derive(Debug, Parser)]
#[command(name = "texrender", version, about = "LaTeX to SVG/PNG rendering service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TEXRENDER_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP rendering service.
    Serve,
    /// Render a single LaTeX fragment and write the image.
    Render(RenderArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// File holding the LaTeX fragment, or `-` for stdin.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Output format: `svg` or `png`.
    #[arg(long, value_name = "FORMAT", default_value = "svg")]
    pub format: String,

    /// Write the image here instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

/// Flags that override file and environment configuration. Accepted before or after the
/// subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the listener host.
    #[arg(long = "host", value_name = "HOST", global = true)]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", env = "PORT", value_name = "PORT", global = true)]
    pub port: Option<u16>,

    /// Externally reachable base URL; enables the keep-alive pinger.
    #[arg(
        long = "external-url",
        env = "RENDER_EXTERNAL_URL",
        value_name = "URL",
        global = true
    )]
    pub external_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the LaTeX compiler executable.
    #[arg(long = "compiler-path", value_name = "PATH", global = true)]
    pub compiler_path: Option<PathBuf>,

    /// Override the PDF converter executable.
    #[arg(long = "converter-path", value_name = "PATH", global = true)]
    pub converter_path: Option<PathBuf>,

    /// Override the compile timeout.
    #[arg(long = "compile-timeout-seconds", value_name = "SECONDS", global = true)]
    pub compile_timeout_seconds: Option<u64>,

    /// Override the number of concurrent renders.
    #[arg(long = "max-concurrent", value_name = "COUNT", global = true)]
    pub max_concurrent: Option<u32>,

    /// Override the directory under which per-request workspaces are created.
    #[arg(long = "workspace-root", value_name = "PATH", global = true)]
    pub workspace_root: Option<PathBuf>,
}
