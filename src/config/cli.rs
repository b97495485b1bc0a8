use std::path::PathBuf;

use clap::{Args, builder::BoolishValueParser};

/// Configuration overrides shared by every command of the `letterbox` binary.
///
/// Flattened into the binary's argument parser; values set here win over files and the
/// environment.
#[derive(Debug, Args, Default, Clone)]
pub struct ConfigArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "LETTERBOX_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// API base URL, e.g. <https://api.example.com/prod>
    #[arg(long = "site", env = "LETTERBOX_SITE_URL", value_name = "URL", global = true)]
    pub site: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Refetch ready entries older than this many milliseconds.
    #[arg(long = "cache-stale-after-ms", value_name = "MS", global = true)]
    pub cache_stale_after_ms: Option<u64>,

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
}
