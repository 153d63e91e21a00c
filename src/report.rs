//! Resource usage reporting for a drained pool.
//!
//! Two kinds of measurement end up in the report:
//!
//! - [`ResourceSample`]: kernel-maintained totals for every terminated and
//!   reaped child of this process (`getrusage(RUSAGE_CHILDREN)`), taken once
//!   after draining.
//! - [`MemorySample`]: a best-effort read of one worker's resident memory.
//!   This races with process exit by nature, so failure is a value
//!   (`Unavailable`), not an error.

use crate::error::Result;
use crate::pool::{SlotState, TerminationReason, WorkerSlot};
use crate::procfs;
use nix::sys::resource::{Usage, UsageWho, getrusage};
use nix::sys::time::TimeVal;
use nix::unistd::Pid;
use std::fmt;
use std::time::Duration;

/// Aggregate resource usage of reaped children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceSample {
    pub user_time: Duration,
    pub system_time: Duration,
    /// Largest resident set size of any single reaped child.
    pub max_rss_kib: u64,
    pub minor_faults: u64,
    pub major_faults: u64,
    pub voluntary_switches: u64,
    pub involuntary_switches: u64,
}

impl ResourceSample {
    /// Read the cumulative usage of this process's reaped children.
    pub fn children() -> Result<Self> {
        let usage = getrusage(UsageWho::RUSAGE_CHILDREN).map_err(std::io::Error::from)?;
        Ok(Self::from_usage(&usage))
    }

    fn from_usage(usage: &Usage) -> Self {
        Self {
            user_time: timeval_to_duration(usage.user_time()),
            system_time: timeval_to_duration(usage.system_time()),
            max_rss_kib: max_rss_to_kib(usage.max_rss()),
            minor_faults: non_negative(usage.minor_page_faults()),
            major_faults: non_negative(usage.major_page_faults()),
            voluntary_switches: non_negative(usage.voluntary_context_switches()),
            involuntary_switches: non_negative(usage.involuntary_context_switches()),
        }
    }
}

fn non_negative(value: nix::libc::c_long) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn timeval_to_duration(tv: TimeVal) -> Duration {
    let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
    let micros = u32::try_from(tv.tv_usec()).unwrap_or(0);
    Duration::new(secs, micros.saturating_mul(1_000))
}

fn max_rss_to_kib(max_rss: nix::libc::c_long) -> u64 {
    let max_rss = non_negative(max_rss);

    #[cfg(target_os = "macos")]
    {
        // macOS: max_rss is in bytes
        max_rss / 1024
    }

    #[cfg(not(target_os = "macos"))]
    {
        // Linux: max_rss is in kilobytes
        max_rss
    }
}

/// CPU time with microsecond precision, e.g. `0.004210s`.
fn format_cpu_time(d: Duration) -> String {
    format!("{}.{:06}s", d.as_secs(), d.subsec_micros())
}

impl fmt::Display for ResourceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resource usage of reaped workers:")?;
        writeln!(
            f,
            "  CPU time:          user {}, system {}",
            format_cpu_time(self.user_time),
            format_cpu_time(self.system_time)
        )?;
        writeln!(f, "  Peak RSS:          {} KiB", self.max_rss_kib)?;
        writeln!(
            f,
            "  Page faults:       {} minor, {} major",
            self.minor_faults, self.major_faults
        )?;
        writeln!(
            f,
            "  Context switches:  {} voluntary, {} involuntary",
            self.voluntary_switches, self.involuntary_switches
        )
    }
}

/// Best-effort resident memory of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemorySample {
    Available {
        rss_kib: u64,
    },
    /// The worker's status could not be read (exited, reaped, or no procfs).
    #[default]
    Unavailable,
}

impl MemorySample {
    /// Sample a process's resident memory now.
    pub fn read(pid: Pid) -> Self {
        match procfs::read_rss_kib(pid) {
            Some(rss_kib) => Self::Available { rss_kib },
            None => Self::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

impl fmt::Display for MemorySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available { rss_kib } => write!(f, "{} KiB", rss_kib),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Report line for one worker slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub index: usize,
    pub pid: Pid,
    pub exit: Option<TerminationReason>,
    /// Sample taken while building the report.
    pub memory: MemorySample,
    /// Sample taken just before the worker was asked to terminate.
    pub last_seen: MemorySample,
}

impl WorkerReport {
    fn sample(slot: &WorkerSlot) -> Self {
        // A reaped worker's PID may already belong to another process.
        let memory = match slot.state() {
            SlotState::Reaped => MemorySample::Unavailable,
            SlotState::Spawned | SlotState::Terminated => MemorySample::read(slot.pid()),
        };
        if !memory.is_available() {
            tracing::debug!(worker = slot.index(), pid = %slot.pid(), "Worker memory unavailable");
        }
        Self {
            index: slot.index(),
            pid: slot.pid(),
            exit: slot.exit(),
            memory,
            last_seen: slot.last_rss(),
        }
    }
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  worker {} (pid {}, ", self.index, self.pid)?;
        match self.exit {
            Some(reason) => write!(f, "{}", reason)?,
            None => write!(f, "running")?,
        }
        write!(f, "): {}", self.memory)?;
        if let (MemorySample::Unavailable, MemorySample::Available { rss_kib }) =
            (self.memory, self.last_seen)
        {
            write!(f, " (last seen {} KiB)", rss_kib)?;
        }
        Ok(())
    }
}

/// Final report for a supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReport {
    pub usage: ResourceSample,
    pub workers: Vec<WorkerReport>,
}

impl ResourceReport {
    /// Collect the aggregate sample and one memory sample per slot, in slot order.
    pub fn collect(slots: &[WorkerSlot]) -> Result<Self> {
        let usage = ResourceSample::children()?;
        let workers = slots.iter().map(WorkerReport::sample).collect();

        tracing::debug!(
            user_time_us = usage.user_time.as_micros() as u64,
            system_time_us = usage.system_time.as_micros() as u64,
            max_rss_kib = usage.max_rss_kib,
            "Collected child resource usage"
        );

        Ok(Self { usage, workers })
    }
}

impl fmt::Display for ResourceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.usage)?;
        writeln!(f, "Per-worker memory:")?;
        for worker in &self.workers {
            writeln!(f, "{}", worker)?;
        }
        Ok(())
    }
}
