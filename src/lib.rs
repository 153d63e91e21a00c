//! procgroup - process-group supervisor.
//!
//! Spawns a fixed pool of worker processes, waits for SIGINT, terminates and
//! reaps every worker in index order, and reports the pool's resource usage.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod procfs;
pub mod report;

pub use error::{ProcgroupError, Result};
