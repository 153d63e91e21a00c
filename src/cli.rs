//! Command-line interface definitions using clap.

use crate::config::{DEFAULT_WORKERS, MAX_WORKERS, SupervisorConfig, WorkerConfig};
use crate::error::ProcgroupError;
use crate::logging::{LogConfig, LogFormat};
use clap::Parser;
use std::time::Duration;
use tracing::Level;

/// Spawn a pool of worker processes and shut them down cleanly on Ctrl+C.
#[derive(Parser, Debug)]
#[command(name = "procgroup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of worker processes (1-20).
    #[arg(
        short = 'n',
        long,
        env = "PROCGROUP_WORKERS",
        default_value_t = DEFAULT_WORKERS as i64,
        allow_negative_numbers = true
    )]
    pub workers: i64,

    /// Quiet mode: workers do not print progress lines.
    #[arg(short, long, env = "PROCGROUP_QUIET")]
    pub quiet: bool,

    /// Give each worker a random delay (1-3 seconds) instead of 1 second.
    #[arg(short, long, env = "PROCGROUP_RANDOM_DELAY")]
    pub random_delay: bool,

    /// How often to check for a shutdown request, in milliseconds.
    #[arg(
        long,
        env = "PROCGROUP_POLL_INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_ms: u64,

    /// Enable verbose logging (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format: pretty, compact, json.
    #[arg(long, env = "PROCGROUP_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Run as a pool worker (used by the supervisor).
    #[arg(long, hide = true)]
    pub internal_worker: bool,

    /// Slot index of this worker.
    #[arg(long, hide = true, requires = "internal_worker", default_value_t = 0)]
    pub worker_index: usize,
}

impl Cli {
    /// Worker configuration when running with `--internal-worker`.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            index: self.worker_index,
            quiet: self.quiet,
            random_delay: self.random_delay,
        }
    }

    /// Logging configuration. `-v` flags win over environment variables.
    pub fn log_config(&self) -> LogConfig {
        let mut config = match self.verbose {
            0 => LogConfig::default(),
            1 => LogConfig::default().with_level(Level::INFO).with_filter("info".into()),
            _ => LogConfig::default().with_level(Level::DEBUG).with_filter("debug".into()),
        }
        .with_env_overrides();
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        config
    }
}

impl TryFrom<&Cli> for SupervisorConfig {
    type Error = ProcgroupError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        Ok(SupervisorConfig::with_workers(cli.workers)?
            .quiet(cli.quiet)
            .random_delay(cli.random_delay)
            .poll_interval(Duration::from_millis(cli.poll_interval_ms)))
    }
}

/// Usage hint shown with configuration errors.
pub fn workers_hint() -> String {
    format!("use -n with a value between 1 and {}", MAX_WORKERS)
}
