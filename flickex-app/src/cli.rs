use clap::Parser;
use std::path::PathBuf;

/// HDR flicker forced-choice experiment.
#[derive(Debug, Parser)]
#[command(name = "flickex", version)]
pub struct Cli {
    /// Run configuration (JSON).
    pub config: PathBuf,

    /// Overrides the configured results directory.
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `debug,winit=warn`.
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: String,

    /// Also write the log to a file in this directory.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// One decorated window with both eyes side by side instead of fullscreen.
    #[arg(long)]
    pub windowed: bool,
}
