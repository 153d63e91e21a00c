//! Worker subprocess main entry point.
//!
//! This runs when `procgroup --internal-worker` is invoked. The worker has no
//! work queue: it ticks on its delay until the supervisor terminates it.

use crate::config::WorkerConfig;
use nix::sys::signal::{self, SigHandler, Signal};
use std::io::{self, Write};

/// Progress line printed once at startup.
fn started_line(config: &WorkerConfig, pid: nix::unistd::Pid) -> String {
    format!("[worker {}] started (pid {})", config.index, pid)
}

/// Progress line printed on every tick.
fn tick_line(config: &WorkerConfig) -> String {
    format!("[worker {}] running...", config.index)
}

fn emit(config: &WorkerConfig, line: &str) {
    if !config.quiet {
        // A closed stdout must not take the worker down before SIGTERM does
        let _ = writeln!(io::stdout(), "{}", line);
    }
}

/// Run the worker subprocess main function.
///
/// Never returns. The process ends when it receives SIGTERM, whose default
/// disposition is left in place.
pub fn run_worker_main(config: WorkerConfig) -> ! {
    // Ctrl+C reaches the whole foreground process group; shutdown is the
    // supervisor's call, so the worker ignores SIGINT.
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::SigIgn).ok();
    }

    let delay = config.delay();
    emit(&config, &started_line(&config, nix::unistd::getpid()));

    loop {
        emit(&config, &tick_line(&config));
        std::thread::sleep(delay);
    }
}
