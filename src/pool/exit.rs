//! Exit analysis for reaped workers.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;

/// Reason why a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with status code.
    Exited(i32),
    /// Ended by the graceful SIGTERM the supervisor sends.
    Terminated,
    /// Killed by some other signal.
    Signaled(Signal),
    /// No status could be collected.
    Unknown,
}

impl TerminationReason {
    /// Whether the worker ended the way an orderly shutdown expects.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Terminated | Self::Exited(0))
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {}", code),
            Self::Terminated => write!(f, "terminated by SIGTERM"),
            Self::Signaled(sig) => write!(f, "killed by signal {}", sig.as_str()),
            Self::Unknown => write!(f, "exit status unknown"),
        }
    }
}

impl From<WaitStatus> for TerminationReason {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => Self::Exited(code),
            WaitStatus::Signaled(_, Signal::SIGTERM, _) => Self::Terminated,
            WaitStatus::Signaled(_, signal, _) => Self::Signaled(signal),
            _ => Self::Unknown,
        }
    }
}
