//! Worker subprocess spawning.
//!
//! Workers are separate OS processes. The default launcher re-executes the
//! current binary in hidden `--internal-worker` mode through
//! `std::process::Command`, so the worker starts from a clean image and only
//! sees the configuration passed on its command line.

use crate::config::WorkerConfig;
use nix::unistd::Pid;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Creates one worker process for a slot.
///
/// Implementations must not block on the worker: return as soon as the
/// process exists.
pub trait WorkerLauncher {
    /// Start a worker and return its process ID.
    fn launch(&self, config: WorkerConfig) -> io::Result<Pid>;
}

impl<L: WorkerLauncher + ?Sized> WorkerLauncher for &L {
    fn launch(&self, config: WorkerConfig) -> io::Result<Pid> {
        (**self).launch(config)
    }
}

/// Start a prepared command and hand back its PID.
///
/// The `Child` is dropped without waiting; reaping is the supervisor's job.
fn spawn_detached(mut cmd: Command) -> io::Result<Pid> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::inherit());
    cmd.stderr(Stdio::inherit());

    let child = cmd.spawn()?;
    Ok(Pid::from_raw(child.id() as i32))
}

/// Launches workers by re-executing a `procgroup` binary.
#[derive(Debug, Clone)]
pub struct SelfExecLauncher {
    exe: PathBuf,
}

impl SelfExecLauncher {
    /// Launcher for the running executable.
    pub fn current() -> io::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
        })
    }

    /// Launcher for an explicit `procgroup` binary.
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// Build the worker command without starting it.
    pub fn command(&self, config: WorkerConfig) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.args(config.to_args());
        cmd
    }
}

impl WorkerLauncher for SelfExecLauncher {
    fn launch(&self, config: WorkerConfig) -> io::Result<Pid> {
        let pid = spawn_detached(self.command(config))?;
        tracing::trace!(worker = config.index, pid = %pid, exe = %self.exe.display(), "Worker exec'd");
        Ok(pid)
    }
}

/// Launches every worker as the same external program.
///
/// The program ignores the worker configuration; it only has to run until it
/// receives SIGTERM.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandLauncher {
    /// Launch `program` for every worker.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl WorkerLauncher for CommandLauncher {
    fn launch(&self, _config: WorkerConfig) -> io::Result<Pid> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        spawn_detached(cmd)
    }
}
