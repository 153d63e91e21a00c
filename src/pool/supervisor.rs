//! Supervisor loop: spawn, wait for SIGINT, terminate, drain, report.

use super::exit::TerminationReason;
use super::signals::ShutdownFlag;
use super::spawn::WorkerLauncher;
use super::table::{ProcessTable, SlotState, WorkerSlot};
use crate::config::SupervisorConfig;
use crate::error::{ProcgroupError, Result};
use crate::procfs;
use crate::report::{MemorySample, ResourceReport};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Supervisor lifecycle phase.
///
/// `Starting -> Running -> Stopping -> Draining -> Done`. A spawn failure
/// goes straight from `Starting` to `Done` after cleaning up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Stopping,
    Draining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Spawned,
    /// Termination requested. `delivered` is false when the target was
    /// already gone.
    Terminate { delivered: bool },
    Reaped(TerminationReason),
}

/// Timestamped journal entry for one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub index: usize,
    pub pid: Pid,
    pub at: Instant,
}

/// Owns the worker pool for one run.
pub struct Supervisor<L: WorkerLauncher> {
    config: SupervisorConfig,
    launcher: L,
    shutdown: ShutdownFlag,
    table: ProcessTable,
    phase: Phase,
    events: Vec<LifecycleEvent>,
}

impl<L: WorkerLauncher> Supervisor<L> {
    /// Validate the configuration and prepare an empty pool.
    ///
    /// No process is created until [`start`](Self::start).
    pub fn new(config: SupervisorConfig, launcher: L, shutdown: ShutdownFlag) -> Result<Self> {
        config.validate()?;
        let table = ProcessTable::with_capacity(config.workers);
        Ok(Self {
            config,
            launcher,
            shutdown,
            table,
            phase: Phase::Starting,
            events: Vec::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn slots(&self) -> &[WorkerSlot] {
        self.table.slots()
    }

    /// Journal of spawn, terminate and reap events in the order they happened.
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ProcgroupError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = %self.phase, to = %next, "Supervisor phase change");
        self.phase = next;
    }

    fn record(&mut self, kind: EventKind, index: usize, pid: Pid, at: Instant) {
        self.events.push(LifecycleEvent {
            kind,
            index,
            pid,
            at,
        });
    }

    /// Spawn every worker, in index order.
    ///
    /// Any launch failure is fatal for the run. The workers started so far
    /// are terminated and reaped before the error is returned, and the
    /// supervisor ends in [`Phase::Done`].
    #[instrument(level = "debug", skip(self), fields(workers = self.config.workers))]
    pub fn start(&mut self) -> Result<()> {
        self.expect_phase(Phase::Starting)?;

        for index in 0..self.config.workers {
            let worker_config = self.config.worker_config(index);
            match self.table.spawn(&self.launcher, worker_config) {
                Ok(slot) => {
                    let pid = slot.pid();
                    info!(worker = index, pid = %pid, "Worker spawned");
                    self.record(EventKind::Spawned, index, pid, Instant::now());
                }
                Err(e) => {
                    error!(worker = index, error = %e, "Spawn failed, tearing down partial pool");
                    if !self.table.is_empty() {
                        self.send_terminations();
                        self.reap_all();
                    }
                    self.transition(Phase::Done);
                    return Err(e);
                }
            }
        }

        debug_assert!(self.table.is_full());
        info!(workers = self.table.len(), "All workers spawned");
        self.transition(Phase::Running);
        Ok(())
    }

    /// Block until shutdown is requested.
    pub fn wait_for_shutdown(&mut self) -> Result<()> {
        self.expect_phase(Phase::Running)?;

        while !self.shutdown.is_set() {
            std::thread::sleep(self.config.poll_interval);
        }

        info!("Shutdown requested");
        self.transition(Phase::Stopping);
        Ok(())
    }

    /// Send SIGTERM to every worker still marked spawned, in index order.
    pub fn terminate_all(&mut self) -> Result<()> {
        self.expect_phase(Phase::Stopping)?;
        self.send_terminations();
        self.transition(Phase::Draining);
        Ok(())
    }

    /// Reap every worker, in index order, then check for leftovers.
    pub fn drain(&mut self) -> Result<()> {
        self.expect_phase(Phase::Draining)?;
        self.reap_all();
        debug_assert!(self.table.all_reaped());
        self.audit_children();
        self.transition(Phase::Done);
        Ok(())
    }

    /// Build the final resource report.
    pub fn report(&self) -> Result<ResourceReport> {
        self.expect_phase(Phase::Done)?;
        ResourceReport::collect(self.table.slots())
    }

    /// Drive the whole lifecycle and return the report.
    pub fn run(&mut self) -> Result<ResourceReport> {
        self.start()?;
        self.wait_for_shutdown()?;
        self.terminate_all()?;
        self.drain()?;
        self.report()
    }

    fn send_terminations(&mut self) {
        let mut sent = Vec::new();

        for slot in self.table.slots_mut() {
            if slot.state() != SlotState::Spawned {
                continue;
            }
            let (index, pid) = (slot.index(), slot.pid());

            let last_rss = MemorySample::read(pid);
            let result = signal::kill(pid, Signal::SIGTERM);
            let at = Instant::now();
            let delivered = match result {
                Ok(()) => {
                    debug!(worker = index, pid = %pid, "Sent SIGTERM");
                    true
                }
                Err(Errno::ESRCH) => {
                    debug!(worker = index, pid = %pid, "Worker already gone, termination is a no-op");
                    false
                }
                Err(e) => {
                    warn!(worker = index, pid = %pid, error = %e, "Failed to send SIGTERM");
                    false
                }
            };

            slot.mark_terminated(last_rss);
            sent.push((EventKind::Terminate { delivered }, index, pid, at));
        }

        for (kind, index, pid, at) in sent {
            self.record(kind, index, pid, at);
        }
    }

    fn reap_all(&mut self) {
        let mut reaped = Vec::new();

        for slot in self.table.slots_mut() {
            if slot.state() == SlotState::Reaped {
                continue;
            }
            let (index, pid) = (slot.index(), slot.pid());

            let reason = reap(index, pid);
            let at = Instant::now();
            slot.mark_reaped(reason);
            reaped.push((EventKind::Reaped(reason), index, pid, at));

            if reason.is_graceful() {
                debug!(worker = index, pid = %pid, reason = %reason, "Worker reaped");
            } else {
                info!(worker = index, pid = %pid, reason = %reason, "Worker reaped");
            }
        }

        for (kind, index, pid, at) in reaped {
            self.record(kind, index, pid, at);
        }
    }

    /// Warn about any pool member that is still a child of this process.
    fn audit_children(&self) {
        let children = procfs::child_pids(nix::unistd::getpid());
        for slot in self.table.slots() {
            if children.contains(&slot.pid()) {
                warn!(worker = slot.index(), pid = %slot.pid(), "Worker still present after drain");
            }
        }
    }
}

/// Blocking wait for one worker's exit status.
fn reap(index: usize, pid: Pid) -> TerminationReason {
    loop {
        match waitpid(pid, None) {
            Ok(status) => return TerminationReason::from(status),
            Err(Errno::EINTR) => continue,
            Err(e) => {
                // Each slot is reaped exactly once, so ECHILD means someone
                // else collected our child.
                error!(worker = index, pid = %pid, error = %e, "waitpid failed on a pool member");
                return TerminationReason::Unknown;
            }
        }
    }
}

impl<L: WorkerLauncher> Drop for Supervisor<L> {
    fn drop(&mut self) {
        if matches!(self.phase, Phase::Running | Phase::Stopping | Phase::Draining) {
            warn!(phase = %self.phase, "Supervisor dropped mid-run, stopping workers");
            self.send_terminations();
            self.reap_all();
        }
    }
}
