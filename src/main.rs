//! procgroup - process-group supervisor

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use procgroup::cli::{self, Cli};
use procgroup::config::SupervisorConfig;
use procgroup::error::ProcgroupError;
use procgroup::logging;
use procgroup::pool::{self, SelfExecLauncher, Supervisor};

/// Program entry point.
///
/// Usage errors exit with status 1 (help and version exit 0). In worker mode
/// control never comes back from the worker loop.
fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    if cli.internal_worker {
        pool::run_worker_main(cli.worker_config());
    }

    logging::init(cli.log_config());

    if let Err(e) = run(&cli) {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        if matches!(
            e.downcast_ref::<ProcgroupError>(),
            Some(ProcgroupError::InvalidWorkerCount { .. })
        ) {
            eprintln!("  {}", cli::workers_hint());
        }
        std::process::exit(1);
    }
}

/// Supervise one pool from spawn to report.
fn run(cli: &Cli) -> Result<()> {
    let config = SupervisorConfig::try_from(cli)?;
    let shutdown = pool::install_sigint_handler()?;
    let launcher =
        SelfExecLauncher::current().context("failed to locate the procgroup executable")?;
    let mut supervisor = Supervisor::new(config, launcher, shutdown)?;

    let config = supervisor.config();
    println!(
        "[procgroup] Starting with {} worker processes.",
        config.workers
    );
    if config.quiet {
        println!("[procgroup] Quiet mode enabled.");
    }
    if config.random_delay {
        println!("[procgroup] Random delay enabled.");
    }

    supervisor.start()?;
    for slot in supervisor.slots() {
        println!(
            "[procgroup] Spawned worker {} (pid {}).",
            slot.index(),
            slot.pid()
        );
    }
    println!("[procgroup] Press Ctrl+C to stop.");

    supervisor.wait_for_shutdown()?;

    println!("[procgroup] Terminating workers...");
    supervisor.terminate_all()?;

    println!("[procgroup] Waiting for workers to exit...");
    supervisor.drain()?;
    println!("[procgroup] All workers reaped.");

    let report = supervisor.report()?;
    println!();
    print!("{}", report);

    Ok(())
}
