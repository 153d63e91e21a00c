//! Worker process pool with signal-driven shutdown.
//!
//! # Architecture
//!
//! ```text
//!        SIGINT ──► ShutdownFlag (atomic)
//!                         │ polled
//!                ┌────────▼────────┐
//!                │   Supervisor    │  Starting → Running → Stopping
//!                │ (ProcessTable)  │           → Draining → Done
//!                └────────┬────────┘
//!                         │ spawn / SIGTERM / waitpid, index order
//!          ┌──────────────┼──────────────┐
//!          │              │              │
//!    ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!    │ Worker 0  │  │ Worker 1  │  │ Worker N  │
//!    │ (process) │  │ (process) │  │ (process) │
//!    └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! - **Process isolation**: workers are separate OS processes started from a
//!   fresh exec of the binary, never threads or forks sharing parent state
//! - **Zombie-free**: every slot is reaped, including workers that died early
//! - **No escalation**: shutdown is SIGTERM only; a worker that ignores it
//!   blocks the drain

mod exit;
mod signals;
mod spawn;
mod supervisor;
mod table;
mod worker_main;

pub use exit::TerminationReason;
pub use signals::{ShutdownFlag, install_sigint_handler};
pub use spawn::{CommandLauncher, SelfExecLauncher, WorkerLauncher};
pub use supervisor::{EventKind, LifecycleEvent, Phase, Supervisor};
pub use table::{ProcessTable, SlotState, WorkerSlot};
pub use worker_main::run_worker_main;
