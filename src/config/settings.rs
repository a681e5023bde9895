//! Configuration settings for GifSync
//!
//! Defines the CLI, the serializable pipeline settings and their defaults.

use crate::core::{PipelineOptions, RetryPolicy};
use crate::error::{GifSyncError, IoResultExt, Result};
use crate::remote::{Direction, PathLayout, DEFAULT_PAGE_SIZE};
use crate::throttle::RpcLimiter;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// GifSync - mirror saved GIFs between a remote and a local directory
#[derive(Parser, Debug, Clone)]
#[command(name = "gifsync")]
#[command(author = "GifSync Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rate-limited, cancellable sync of saved GIFs")]
#[command(long_about = r#"
GifSync copies saved GIFs between a remote store and a local directory.

Every remote call draws from one shared rate limiter, a fixed pool of
workers transfers items concurrently, and items already present on the
other side are skipped, so re-running a sync is cheap.

Examples:
  gifsync download --remote /srv/gifs --out ~/gifs      # Mirror remote locally
  gifsync -j 8 --rate 50ms download --remote /srv/gifs  # More workers, faster rate
  gifsync upload --remote /srv/gifs --input ~/new-gifs  # Save local files remotely
"#)]
pub struct CliArgs {
    /// JSON config file; command-line flags take precedence
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Minimum spacing between remote calls (e.g. 100ms, 1s)
    #[arg(long, global = true, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub rate: Option<Duration>,

    /// Remote calls allowed back to back before spacing applies
    #[arg(long, global = true, value_name = "NUM")]
    pub rate_burst: Option<u32>,

    /// Items per listing page
    #[arg(long, global = true, value_name = "NUM")]
    pub page_size: Option<usize>,

    /// Channel slots per worker
    #[arg(long, global = true, value_name = "NUM")]
    pub channel_factor: Option<usize>,

    /// Retry a failed transfer N more times
    #[arg(long, global = true, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Delay before the first retry; doubles after each attempt
    #[arg(long, global = true, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub retry_delay: Option<Duration>,

    /// Show progress bars
    #[arg(long, global = true)]
    pub progress: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

impl CliArgs {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Download every saved GIF into a local directory
    #[command(name = "download")]
    Download {
        /// Root of the directory-backed remote
        #[arg(long, env = "GIFSYNC_REMOTE", value_name = "DIR")]
        remote: PathBuf,

        /// Output directory (default: <tmp>/gifsync)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Upload every GIF of a local directory and save it remotely
    #[command(name = "upload")]
    Upload {
        /// Root of the directory-backed remote
        #[arg(long, env = "GIFSYNC_REMOTE", value_name = "DIR")]
        remote: PathBuf,

        /// Directory holding the files to upload
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,
    },
}

impl Commands {
    pub fn remote(&self) -> &Path {
        match self {
            Self::Download { remote, .. } | Self::Upload { remote, .. } => remote,
        }
    }
}

/// Default download directory
pub fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("gifsync")
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Runtime settings of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker count
    pub jobs: usize,
    /// Rate limiter refill interval in milliseconds
    pub rate_interval_ms: u64,
    /// Rate limiter burst size
    pub rate_burst: u32,
    /// Listing page size
    pub page_size: usize,
    /// Channel slots per worker
    pub channel_factor: usize,
    /// Extra attempts per failed transfer
    pub retries: u32,
    /// Base retry delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jobs: PipelineOptions::DEFAULT_WORKERS,
            rate_interval_ms: 100,
            rate_burst: 3,
            page_size: DEFAULT_PAGE_SIZE,
            channel_factor: 1,
            retries: 0,
            retry_delay_ms: 500,
        }
    }
}

impl PipelineConfig {
    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_path(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| GifSyncError::config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Create config from CLI arguments, layered over the config file if any
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(jobs) = args.jobs {
            config.jobs = jobs;
        }
        if let Some(rate) = args.rate {
            config.rate_interval_ms = whole_millis("--rate", rate)?;
        }
        if let Some(burst) = args.rate_burst {
            config.rate_burst = burst;
        }
        if let Some(page_size) = args.page_size {
            config.page_size = page_size;
        }
        if let Some(factor) = args.channel_factor {
            config.channel_factor = factor;
        }
        if let Some(retries) = args.retries {
            config.retries = retries;
        }
        if let Some(delay) = args.retry_delay {
            config.retry_delay_ms = whole_millis("--retry-delay", delay)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(GifSyncError::config("jobs must be at least 1"));
        }
        if self.rate_interval_ms == 0 {
            return Err(GifSyncError::config("rate interval must be at least 1ms"));
        }
        if self.rate_burst == 0 {
            return Err(GifSyncError::config("rate burst must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(GifSyncError::config("page size must be at least 1"));
        }
        if self.channel_factor == 0 {
            return Err(GifSyncError::config("channel factor must be at least 1"));
        }
        Ok(())
    }

    pub fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_interval_ms)
    }

    /// Shared limiter for every remote call of a run
    pub fn limiter(&self) -> Result<RpcLimiter> {
        RpcLimiter::new(self.rate_interval(), self.rate_burst)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retries.saturating_add(1),
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    pub fn pipeline_options(&self, direction: Direction, layout: PathLayout) -> PipelineOptions {
        PipelineOptions::new(direction, layout)
            .with_workers(self.jobs)
            .with_channel_factor(self.channel_factor)
            .with_retry(self.retry_policy())
    }
}

/// Millisecond count of `value`, which must be a whole number of milliseconds
fn whole_millis(flag: &str, value: Duration) -> Result<u64> {
    if value.subsec_nanos() % 1_000_000 != 0 {
        return Err(GifSyncError::config(format!(
            "{} must be a whole number of milliseconds, got {}",
            flag,
            humantime::format_duration(value)
        )));
    }
    u64::try_from(value.as_millis())
        .map_err(|_| GifSyncError::config(format!("{} is out of range", flag)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["gifsync", "download", "--remote", "/srv"]);
        let config = PipelineConfig::from_cli(&args).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(matches!(args.command, Commands::Download { .. }));
        assert_eq!(args.log_level(), "info");
        assert_eq!(config.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_cli_overrides() {
        let args = parse(&[
            "gifsync", "-j", "8", "--rate", "250ms", "--rate-burst", "5", "--retries", "2", "-vv", "upload",
            "--remote", "/srv", "--input", "/in",
        ]);
        let config = PipelineConfig::from_cli(&args).unwrap();
        assert_eq!(config.jobs, 8);
        assert_eq!(config.rate_interval(), Duration::from_millis(250));
        assert_eq!(config.rate_burst, 5);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(args.log_level(), "trace");
        assert_eq!(args.command.remote(), Path::new("/srv"));

        let options = config.pipeline_options(Direction::Upload, PathLayout::new("/in"));
        assert_eq!(options.workers, 8);
    }

    #[test]
    fn test_config_file_layered_under_cli() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gifsync.json");
        std::fs::write(&path, r#"{ "jobs": 6, "page_size": 20 }"#).unwrap();

        let file = path.to_str().unwrap();
        let args = parse(&["gifsync", "--config", file, "-j", "2", "download", "--remote", "/srv"]);
        let config = PipelineConfig::from_cli(&args).unwrap();
        assert_eq!(config.jobs, 2);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.rate_burst, PipelineConfig::default().rate_burst);
    }

    #[test]
    fn test_sub_millisecond_durations_rejected() {
        let args = parse(&["gifsync", "--rate", "1500us", "download", "--remote", "/srv"]);
        let err = PipelineConfig::from_cli(&args).unwrap_err();
        assert!(matches!(err, GifSyncError::ConfigError(_)));
        assert!(err.to_string().contains("--rate"));

        let args = parse(&["gifsync", "--retry-delay", "10ms 5us", "download", "--remote", "/srv"]);
        assert!(matches!(PipelineConfig::from_cli(&args), Err(GifSyncError::ConfigError(_))));

        let args = parse(&["gifsync", "--rate", "900us", "download", "--remote", "/srv"]);
        assert!(matches!(PipelineConfig::from_cli(&args), Err(GifSyncError::ConfigError(_))));

        let args = parse(&["gifsync", "--rate", "2ms", "--retry-delay", "1s", "download", "--remote", "/srv"]);
        let config = PipelineConfig::from_cli(&args).unwrap();
        assert_eq!(config.rate_interval(), Duration::from_millis(2));
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let args = parse(&["gifsync", "-j", "0", "download", "--remote", "/srv"]);
        assert!(matches!(PipelineConfig::from_cli(&args), Err(GifSyncError::ConfigError(_))));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::from_file(&path), Err(GifSyncError::ConfigError(_))));
        assert!(matches!(
            PipelineConfig::from_file(&dir.path().join("missing.json")),
            Err(GifSyncError::Io { .. })
        ));
    }
}
