//! Windows process probe.

use super::{Liveness, StartIdentity};
use std::io;
use winapi::shared::minwindef::{DWORD, FALSE, FILETIME};
use winapi::shared::winerror::{ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER};
use winapi::um::handleapi::CloseHandle;
use winapi::um::minwinbase::STILL_ACTIVE;
use winapi::um::processthreadsapi::{
    GetExitCodeProcess, GetProcessTimes, OpenProcess, TerminateProcess,
};
use winapi::um::winnt::{HANDLE, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE};

/// Owned process handle, closed on drop.
struct ProcessHandle(HANDLE);

impl ProcessHandle {
    fn open(pid: u32) -> io::Result<Option<Self>> {
        Self::open_with(pid, PROCESS_QUERY_LIMITED_INFORMATION)
    }

    fn open_with(pid: u32, access: DWORD) -> io::Result<Option<Self>> {
        // SAFETY: OpenProcess has no preconditions; a null handle signals failure.
        let handle = unsafe { OpenProcess(access, FALSE, pid) };
        if !handle.is_null() {
            return Ok(Some(Self(handle)));
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == ERROR_INVALID_PARAMETER as i32 => Ok(None),
            _ => Err(err),
        }
    }

    fn still_active(&self) -> io::Result<bool> {
        let mut exit_code: DWORD = 0;
        // SAFETY: the handle is valid for the lifetime of `self`.
        if unsafe { GetExitCodeProcess(self.0, &mut exit_code) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(exit_code == STILL_ACTIVE)
    }

    fn creation_time(&self) -> io::Result<StartIdentity> {
        let zero = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };
        let (mut created, mut exited, mut kernel, mut user) = (zero, zero, zero, zero);
        // SAFETY: the handle is valid and every out-pointer refers to a local.
        let ok = unsafe {
            GetProcessTimes(self.0, &mut created, &mut exited, &mut kernel, &mut user)
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        let ticks = ((created.dwHighDateTime as u64) << 32) | created.dwLowDateTime as u64;
        Ok(StartIdentity(ticks))
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess and is closed exactly once.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

pub(super) fn probe_pid(pid: u32, expected: StartIdentity) -> Liveness {
    let handle = match ProcessHandle::open(pid) {
        Ok(Some(handle)) => handle,
        Ok(None) => return Liveness::Dead,
        Err(e) if e.raw_os_error() == Some(ERROR_ACCESS_DENIED as i32) => {
            return Liveness::Indeterminate(format!("access denied opening pid {}", pid));
        }
        Err(e) => return Liveness::Indeterminate(format!("failed to open pid {}: {}", pid, e)),
    };

    match handle.still_active() {
        Ok(false) => return Liveness::Dead,
        Ok(true) => {}
        Err(e) => {
            return Liveness::Indeterminate(format!(
                "failed to query exit code of pid {}: {}",
                pid, e
            ));
        }
    }

    match handle.creation_time() {
        Ok(actual) if actual == expected => Liveness::Alive,
        Ok(_) => Liveness::Dead,
        Err(e) => Liveness::Indeterminate(format!(
            "failed to read creation time of pid {}: {}",
            pid, e
        )),
    }
}

pub(super) fn start_identity(pid: u32) -> io::Result<Option<StartIdentity>> {
    match ProcessHandle::open(pid)? {
        Some(handle) => handle.creation_time().map(Some),
        None => Ok(None),
    }
}

/// Terminate `pid`. Windows has no process groups to signal, so only the
/// holder itself is stopped.
pub(super) fn terminate(pid: u32) -> io::Result<bool> {
    let Some(handle) = ProcessHandle::open_with(pid, PROCESS_TERMINATE)? else {
        return Ok(false);
    };
    // SAFETY: the handle is valid and was opened with PROCESS_TERMINATE.
    if unsafe { TerminateProcess(handle.0, 1) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(true)
}
