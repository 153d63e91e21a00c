//! Process table: logical worker index to process ID and lifecycle state.

use super::exit::TerminationReason;
use super::spawn::WorkerLauncher;
use crate::config::WorkerConfig;
use crate::error::{ProcgroupError, Result};
use crate::report::MemorySample;
use nix::unistd::Pid;

/// Lifecycle state of a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Process started and not yet asked to stop.
    Spawned,
    /// SIGTERM sent (or the process was already gone).
    Terminated,
    /// Exit status collected; no zombie remains.
    Reaped,
}

/// One entry in the process table.
///
/// A slot only exists once its process does, so the PID is always set and
/// never changes.
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    index: usize,
    pid: Pid,
    state: SlotState,
    exit: Option<TerminationReason>,
    last_rss: MemorySample,
}

impl WorkerSlot {
    pub(crate) fn new(index: usize, pid: Pid) -> Self {
        Self {
            index,
            pid,
            state: SlotState::Spawned,
            exit: None,
            last_rss: MemorySample::Unavailable,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// How the worker ended, once reaped.
    pub fn exit(&self) -> Option<TerminationReason> {
        self.exit
    }

    /// Memory sampled right before the termination request.
    pub fn last_rss(&self) -> MemorySample {
        self.last_rss
    }

    pub(crate) fn mark_terminated(&mut self, last_rss: MemorySample) {
        debug_assert_eq!(self.state, SlotState::Spawned);
        self.last_rss = last_rss;
        self.state = SlotState::Terminated;
    }

    pub(crate) fn mark_reaped(&mut self, reason: TerminationReason) {
        debug_assert_ne!(self.state, SlotState::Reaped);
        self.exit = Some(reason);
        self.state = SlotState::Reaped;
    }
}

/// Ordered, fixed-capacity collection of worker slots.
#[derive(Debug)]
pub struct ProcessTable {
    slots: Vec<WorkerSlot>,
    capacity: usize,
}

impl ProcessTable {
    /// An empty table for `capacity` workers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Launch the worker for the next free index and record it.
    ///
    /// Slots fill strictly in index order. A `config.index` other than the
    /// next free index, or a full table, is rejected before anything is
    /// launched.
    pub fn spawn<L: WorkerLauncher + ?Sized>(
        &mut self,
        launcher: &L,
        config: WorkerConfig,
    ) -> Result<&WorkerSlot> {
        let index = self.slots.len();
        if config.index != index || self.is_full() {
            return Err(ProcgroupError::SlotUnavailable {
                index: config.index,
                next: index,
                capacity: self.capacity,
            });
        }

        let pid = launcher
            .launch(config)
            .map_err(|source| ProcgroupError::Spawn { index, source })?;

        self.slots.push(WorkerSlot::new(index, pid));
        Ok(&self.slots[index])
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether every slot has been filled.
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [WorkerSlot] {
        &mut self.slots
    }

    /// Whether every slot has been reaped.
    pub fn all_reaped(&self) -> bool {
        self.slots.iter().all(|s| s.state == SlotState::Reaped)
    }
}
