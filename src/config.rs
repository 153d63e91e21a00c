//! Supervisor and worker configuration.

use crate::error::{ProcgroupError, Result};
use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Upper bound on the pool size.
pub const MAX_WORKERS: usize = 20;

/// Pool size when none is requested.
pub const DEFAULT_WORKERS: usize = 5;

/// How often the supervisor checks the shutdown flag while running.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between worker progress ticks in fixed mode.
pub const FIXED_DELAY: Duration = Duration::from_secs(1);

/// Bounds (whole seconds) for a worker's delay in random mode.
pub const RANDOM_DELAY_SECS: RangeInclusive<u64> = 1..=3;

/// Validate a requested worker count against `[1, MAX_WORKERS]`.
///
/// Takes a signed value so that negative counts coming from the command line
/// are reported as a configuration error rather than a parse failure.
pub fn validate_worker_count(requested: i64) -> Result<usize> {
    match usize::try_from(requested) {
        Ok(count) if (1..=MAX_WORKERS).contains(&count) => Ok(count),
        _ => Err(ProcgroupError::InvalidWorkerCount {
            requested,
            max: MAX_WORKERS,
        }),
    }
}

/// Configuration for the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Number of worker processes to spawn.
    pub workers: usize,
    /// Suppress per-worker progress output.
    pub quiet: bool,
    /// Randomize each worker's delay within [`RANDOM_DELAY_SECS`].
    pub random_delay: bool,
    /// Poll interval for the shutdown flag.
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            quiet: false,
            random_delay: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SupervisorConfig {
    /// Create a configuration with a validated worker count and defaults elsewhere.
    pub fn with_workers(requested: i64) -> Result<Self> {
        Ok(Self {
            workers: validate_worker_count(requested)?,
            ..Default::default()
        })
    }

    /// Set quiet mode.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set random delay mode.
    pub fn random_delay(mut self, random_delay: bool) -> Self {
        self.random_delay = random_delay;
        self
    }

    /// Set the shutdown poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check the worker count is still within bounds.
    pub fn validate(&self) -> Result<()> {
        let requested = i64::try_from(self.workers).unwrap_or(i64::MAX);
        validate_worker_count(requested).map(|_| ())
    }

    /// The configuration handed to worker `index`.
    pub fn worker_config(&self, index: usize) -> WorkerConfig {
        WorkerConfig {
            index,
            quiet: self.quiet,
            random_delay: self.random_delay,
        }
    }
}

/// Everything a worker needs, captured by value when it is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Logical slot index of this worker.
    pub index: usize,
    /// Suppress progress output.
    pub quiet: bool,
    /// Pick a random delay instead of [`FIXED_DELAY`].
    pub random_delay: bool,
}

impl WorkerConfig {
    /// Choose this worker's loop delay.
    pub fn delay(&self) -> Duration {
        if self.random_delay {
            Duration::from_secs(rand::rng().random_range(RANDOM_DELAY_SECS))
        } else {
            FIXED_DELAY
        }
    }

    /// Command-line arguments that re-create this configuration in a
    /// re-executed `procgroup` binary.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--internal-worker".to_string(),
            "--worker-index".to_string(),
            self.index.to_string(),
        ];
        if self.quiet {
            args.push("--quiet".to_string());
        }
        if self.random_delay {
            args.push("--random-delay".to_string());
        }
        args
    }
}
