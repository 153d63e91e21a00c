//! SIGINT bridge.
//!
//! The handler only flips an atomic flag and, the first time, writes a fixed
//! message with a raw `write(2)`. Everything else happens on the supervisor's
//! normal control path, which polls the flag.

use crate::error::{ProcgroupError, Result};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once per run by the SIGINT handler.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Pre-formatted so the handler never builds a string.
const SIGINT_MESSAGE: &[u8] = b"\n[procgroup] SIGINT caught, cleaning up...\n";

extern "C" fn handle_sigint(_signal: nix::libc::c_int) {
    if !SHUTDOWN_REQUESTED.swap(true, Ordering::SeqCst) {
        // Safety: fd 1 stays open for the life of the process.
        let stdout = unsafe { BorrowedFd::borrow_raw(nix::libc::STDOUT_FILENO) };
        let _ = nix::unistd::write(stdout, SIGINT_MESSAGE);
    }
}

/// Handle to the shutdown flag shared between signal context and the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownFlag {
    flag: &'static AtomicBool,
}

impl ShutdownFlag {
    /// A flag that no signal handler writes to.
    ///
    /// Useful for embedding the supervisor or for tests that trip the flag
    /// by hand. Each call leaks one `AtomicBool`.
    pub fn detached() -> Self {
        Self {
            flag: Box::leak(Box::new(AtomicBool::new(false))),
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown. Returns `true` only for the call that set the flag.
    pub fn trip(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }
}

/// Install the SIGINT handler and return a handle to the flag it sets.
///
/// `SA_RESTART` keeps `waitpid` and `sleep` in the supervisor from failing
/// with `EINTR` when the signal lands mid-call.
pub fn install_sigint_handler() -> Result<ShutdownFlag> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // Safety: the handler only touches an atomic and calls write(2).
    unsafe { signal::sigaction(Signal::SIGINT, &action) }
        .map_err(ProcgroupError::SignalInstall)?;

    tracing::debug!("SIGINT handler installed");

    Ok(ShutdownFlag {
        flag: &SHUTDOWN_REQUESTED,
    })
}
