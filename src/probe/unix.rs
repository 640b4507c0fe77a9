//! Unix process probe.

use super::{Liveness, StartIdentity};
use std::io;

/// What `kill(pid, 0)` says about a pid.
#[derive(Debug, PartialEq, Eq)]
enum Signal0 {
    Exists,
    Missing,
}

fn signal_zero(pid: u32) -> Signal0 {
    // SAFETY: signal 0 performs the existence and permission checks without
    // delivering anything to the target.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return Signal0::Exists;
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(code) if code == libc::ESRCH => Signal0::Missing,
        // EPERM: the process exists but belongs to someone else.
        _ => Signal0::Exists,
    }
}

pub(super) fn probe_pid(pid: u32, expected: StartIdentity) -> Liveness {
    // 0 and negative values address process groups, never a single holder.
    if pid == 0 || pid > i32::MAX as u32 {
        return Liveness::Dead;
    }

    if signal_zero(pid) == Signal0::Missing {
        return Liveness::Dead;
    }

    match start_identity(pid) {
        Ok(Some(actual)) if actual == expected => Liveness::Alive,
        Ok(Some(actual)) => {
            tracing::debug!(pid, %expected, %actual, "pid reused by another process");
            Liveness::Dead
        }
        Ok(None) => Liveness::Dead,
        Err(e) => Liveness::Indeterminate(format!(
            "failed to read start time of pid {}: {}",
            pid, e
        )),
    }
}

/// Send SIGTERM to the process group `pid` leads or belongs to.
///
/// When that group is our own, only `pid` is signalled. `Ok(false)` means
/// the process was already gone.
pub(super) fn terminate(pid: u32) -> io::Result<bool> {
    if pid == 0 || pid > i32::MAX as u32 {
        return Ok(false);
    }
    let pid = pid as libc::pid_t;

    // SAFETY: getpgid and getpgrp only read the process table.
    let (group, own_group) = unsafe { (libc::getpgid(pid), libc::getpgrp()) };
    if group < 0 {
        return gone_or_error();
    }

    // SAFETY: the target is a positive pid or process group id.
    let rc = if group == own_group {
        unsafe { libc::kill(pid, libc::SIGTERM) }
    } else {
        unsafe { libc::killpg(group, libc::SIGTERM) }
    };
    if rc == 0 { Ok(true) } else { gone_or_error() }
}

fn gone_or_error() -> io::Result<bool> {
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(err)
    }
}

/// Read the start identity of `pid`, or `None` if it no longer runs.
#[cfg(target_os = "linux")]
pub(super) fn start_identity(pid: u32) -> io::Result<Option<StartIdentity>> {
    let path = format!("/proc/{}/stat", pid);
    match std::fs::read_to_string(&path) {
        Ok(stat) => parse_proc_stat(&stat),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Extract `starttime` (field 22) from a `/proc/<pid>/stat` line.
///
/// The command name (field 2) is parenthesised and may itself contain spaces
/// and parentheses, so fields are counted from the last `)`. Zombies count
/// as gone: they have already closed every file and released every lock.
#[cfg(any(target_os = "linux", test))]
pub(super) fn parse_proc_stat(stat: &str) -> io::Result<Option<StartIdentity>> {
    let rest = stat
        .rfind(')')
        .map(|idx| &stat[idx + 1..])
        .ok_or_else(|| invalid_stat("missing command name"))?;

    let fields: Vec<&str> = rest.split_whitespace().collect();

    // fields[0] is field 3 (state), so field N lives at index N - 3.
    match fields.first() {
        Some(&"Z") | Some(&"X") | Some(&"x") => return Ok(None),
        Some(_) => {}
        None => return Err(invalid_stat("missing state")),
    }

    let ticks = fields
        .get(19)
        .ok_or_else(|| invalid_stat("missing starttime"))?
        .parse::<u64>()
        .map_err(|e| invalid_stat(&format!("bad starttime: {}", e)))?;

    Ok(Some(StartIdentity(ticks)))
}

#[cfg(any(target_os = "linux", test))]
fn invalid_stat(reason: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unexpected /proc stat format: {}", reason),
    )
}

/// Read the start identity of `pid` through `ps`, or `None` if it no longer runs.
#[cfg(not(target_os = "linux"))]
pub(super) fn start_identity(pid: u32) -> io::Result<Option<StartIdentity>> {
    let output = std::process::Command::new("ps")
        .args(["-o", "lstart=", "-p", &pid.to_string()])
        .env("LC_ALL", "C")
        .output()?;

    let lstart = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if lstart.is_empty() {
        return Ok(None);
    }

    parse_lstart(&lstart).map(Some)
}

/// Convert `ps -o lstart` output (e.g. `Mon Jan  1 00:00:00 2024`) to seconds.
#[cfg(any(not(target_os = "linux"), test))]
pub(super) fn parse_lstart(lstart: &str) -> io::Result<StartIdentity> {
    let normalized = lstart.split_whitespace().collect::<Vec<_>>().join(" ");
    let started = chrono::NaiveDateTime::parse_from_str(&normalized, "%a %b %d %H:%M:%S %Y")
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected ps lstart format '{}': {}", lstart, e),
            )
        })?;

    Ok(StartIdentity(started.and_utc().timestamp().max(0) as u64))
}
