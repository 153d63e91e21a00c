//! Integration tests for the procgroup binary.
//!
//! Argument and exit-code checks use `assert_cmd`. Shutdown scenarios start
//! the binary directly so the test can read its output while it runs and
//! deliver SIGINT at a chosen moment.

use assert_cmd::Command;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdout, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_procgroup");

/// Get a command for the procgroup binary.
fn procgroup() -> Command {
    let mut cmd = Command::new(BIN);
    cmd.env_remove("PROCGROUP_WORKERS")
        .env_remove("PROCGROUP_QUIET")
        .env_remove("PROCGROUP_RANDOM_DELAY");
    cmd
}

/// A supervisor running in the background with its stdout captured.
struct Running {
    child: Child,
    stdout: BufReader<ChildStdout>,
    /// Lines read so far.
    seen: Vec<String>,
}

impl Running {
    fn start(args: &[&str]) -> Self {
        let mut child = std::process::Command::new(BIN)
            .args(args)
            .args(["--poll-interval-ms", "50"])
            .env_remove("PROCGROUP_WORKERS")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start procgroup");
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            stdout,
            seen: Vec::new(),
        }
    }

    fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }

    /// Read output until `count` workers have been reported as spawned and
    /// return their PIDs in slot order.
    fn wait_for_workers(&mut self, count: usize) -> Vec<Pid> {
        let mut pids = Vec::new();
        while pids.len() < count {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line).expect("Failed to read stdout");
            assert!(n > 0, "procgroup exited early; output so far: {:?}", self.seen);
            if let Some(pid) = parse_spawned_pid(&line) {
                pids.push(pid);
            }
            self.seen.push(line);
        }
        pids
    }

    fn interrupt(&self) {
        signal::kill(self.pid(), Signal::SIGINT).expect("Failed to send SIGINT");
    }

    /// Wait for exit and return the status and the complete stdout.
    fn finish(mut self) -> (ExitStatus, String) {
        let mut rest = String::new();
        self.stdout
            .read_to_string(&mut rest)
            .expect("Failed to read stdout");
        let status = self.child.wait().expect("Failed to wait for procgroup");
        let mut output = self.seen.concat();
        output.push_str(&rest);
        (status, output)
    }
}

/// Extract the PID from a `[procgroup] Spawned worker N (pid P).` line.
fn parse_spawned_pid(line: &str) -> Option<Pid> {
    let rest = line.trim().strip_prefix("[procgroup] Spawned worker ")?;
    let pid = rest.split("(pid ").nth(1)?.strip_suffix(").")?;
    pid.parse().ok().map(Pid::from_raw)
}

fn process_exists(pid: Pid) -> bool {
    signal::kill(pid, None).is_ok()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays() {
    procgroup()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--quiet"))
        .stdout(predicate::str::contains("--random-delay"))
        .stdout(predicate::str::contains("internal-worker").not());
}

#[test]
fn test_version_displays() {
    procgroup()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("procgroup"));
}

// ============================================================================
// Configuration Rejection Tests
// ============================================================================

#[test]
fn test_rejects_out_of_range_counts() {
    for count in ["0", "-1", "21", "25"] {
        procgroup()
            .args(["-n", count])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Spawned worker").not())
            .stderr(predicate::str::contains("between 1 and 20"));
    }
}

#[test]
fn test_rejects_count_from_env() {
    procgroup()
        .env("PROCGROUP_WORKERS", "0")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("got 0"));
}

#[test]
fn test_rejects_non_numeric_count() {
    procgroup().args(["-n", "many"]).assert().code(1);
}

#[test]
fn test_unknown_flag_exits_one() {
    procgroup()
        .arg("--bogus")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--bogus"));
}

// ============================================================================
// Shutdown Scenarios
// ============================================================================

#[test]
fn test_sigint_drains_quiet_pool() {
    let mut run = Running::start(&["-n", "3", "-q"]);
    let pids = run.wait_for_workers(3);
    sleep(Duration::from_secs(2));
    run.interrupt();

    let (status, output) = run.finish();
    assert_eq!(status.code(), Some(0), "output: {}", output);

    assert!(output.contains("Starting with 3 worker processes."));
    assert!(output.contains("Quiet mode enabled."));
    assert!(output.contains("SIGINT caught"));
    assert!(output.contains("All workers reaped."));
    assert!(output.contains("Resource usage of reaped workers:"));
    assert_eq!(output.matches("terminated by SIGTERM").count(), 3);
    assert!(!output.contains("] running..."), "quiet workers printed progress");

    for pid in pids {
        assert!(!process_exists(pid), "worker {} still exists", pid);
    }
}

#[test]
fn test_report_lists_workers_in_order() {
    let mut run = Running::start(&["-n", "4", "-q"]);
    run.wait_for_workers(4);
    run.interrupt();

    let (status, output) = run.finish();
    assert!(status.success());

    let positions: Vec<usize> = (0..4)
        .map(|i| output.find(&format!("  worker {} (pid", i)).expect("worker line"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_double_sigint_same_as_single() {
    fn run_with(interrupts: usize) -> (Option<i32>, usize, usize) {
        let mut run = Running::start(&["-n", "3", "-q"]);
        run.wait_for_workers(3);
        for _ in 0..interrupts {
            run.interrupt();
        }
        let (status, output) = run.finish();
        (
            status.code(),
            output.matches("SIGINT caught").count(),
            output.matches("terminated by SIGTERM").count(),
        )
    }

    assert_eq!(run_with(1), (Some(0), 1, 3));
    assert_eq!(run_with(2), (Some(0), 1, 3));
}

#[test]
fn test_externally_killed_worker_reported_unavailable() {
    let mut run = Running::start(&["-n", "3", "-q"]);
    let pids = run.wait_for_workers(3);

    signal::kill(pids[1], Signal::SIGKILL).expect("Failed to kill worker");
    sleep(Duration::from_millis(200));
    run.interrupt();

    let (status, output) = run.finish();
    assert_eq!(status.code(), Some(0), "output: {}", output);

    let victim_line = output
        .lines()
        .find(|l| l.starts_with("  worker 1 "))
        .expect("report line for worker 1");
    assert!(victim_line.contains("killed by signal SIGKILL"));
    assert!(victim_line.ends_with("unavailable"));

    assert_eq!(output.matches("terminated by SIGTERM").count(), 2);
    for pid in pids {
        assert!(!process_exists(pid));
    }
}

#[test]
fn test_workers_print_progress_unless_quiet() {
    let mut run = Running::start(&["-n", "1"]);
    run.wait_for_workers(1);
    sleep(Duration::from_millis(1500));
    run.interrupt();

    let (status, output) = run.finish();
    assert!(status.success());
    assert!(output.contains("[worker 0] started (pid"));
    assert!(output.contains("[worker 0] running..."));
}

#[test]
fn test_random_delay_banner() {
    let mut run = Running::start(&["-n", "2", "-q", "-r"]);
    run.wait_for_workers(2);
    run.interrupt();

    let (status, output) = run.finish();
    assert!(status.success());
    assert!(output.contains("Random delay enabled."));
}

#[test]
fn test_parse_spawned_pid() {
    assert_eq!(
        parse_spawned_pid("[procgroup] Spawned worker 2 (pid 4242).\n"),
        Some(Pid::from_raw(4242))
    );
    assert_eq!(parse_spawned_pid("[worker 2] running..."), None);
}
