//! Minimal `/proc` readers.
//!
//! Everything here is best effort: a missing or unreadable entry yields
//! `None` or an empty list. On platforms without procfs these always come
//! back empty.

use nix::unistd::Pid;
use std::fs;

/// Resident set size of a live process in KiB, from `/proc/<pid>/status`.
///
/// Zombies have no `VmRSS` line, so this is `None` for a worker that has
/// exited but not yet been reaped as well as for one that is fully gone.
pub fn read_rss_kib(pid: Pid) -> Option<u64> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let status = fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kib| kib.parse().ok())
}

/// Parent PID from the contents of `/proc/<pid>/stat`.
///
/// The command name is parenthesized and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
fn parse_stat_ppid(stat: &str) -> Option<i32> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    let mut fields = after_comm.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}

/// All processes whose parent is `parent`, zombies included.
pub fn child_pids(parent: Pid) -> Vec<Pid> {
    if !cfg!(target_os = "linux") {
        return Vec::new();
    }
    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut children: Vec<Pid> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
        .filter(|&pid| {
            fs::read_to_string(format!("/proc/{}/stat", pid))
                .ok()
                .and_then(|stat| parse_stat_ppid(&stat))
                == Some(parent.as_raw())
        })
        .map(Pid::from_raw)
        .collect();
    children.sort();
    children
}
