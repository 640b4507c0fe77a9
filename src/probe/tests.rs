//! Tests for the process probe.

use super::*;
use crate::test_support::dead_pid;

#[test]
fn test_current_process_is_alive() {
    let probe = SystemProbe;
    let me = probe.current().unwrap();

    assert_eq!(me.pid, std::process::id());
    assert_eq!(probe.probe(me.pid, me.start), Liveness::Alive);
    assert!(probe.is_alive(me.pid, me.start));
}

#[test]
fn test_current_identity_is_stable() {
    let probe = SystemProbe;
    let first = probe.current().unwrap();
    let second = probe.current().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_start_identity_mismatch_is_dead() {
    // Same pid, different incarnation: the PID-reuse case.
    let probe = SystemProbe;
    let me = probe.current().unwrap();
    let other = StartIdentity(me.start.0.wrapping_add(1));

    assert_eq!(probe.probe(me.pid, other), Liveness::Dead);
    assert!(!probe.is_alive(me.pid, other));
}

#[test]
fn test_exited_process_is_dead() {
    let probe = SystemProbe;
    let pid = dead_pid();
    assert_eq!(probe.probe(pid, StartIdentity(0)), Liveness::Dead);
}

#[test]
fn test_nonexistent_pid_is_dead_not_error() {
    let probe = SystemProbe;
    // Above the default pid_max on every supported platform.
    assert_eq!(probe.probe(i32::MAX as u32 - 1, StartIdentity(1)), Liveness::Dead);
}

#[test]
fn test_pid_zero_is_dead() {
    let probe = SystemProbe;
    assert_eq!(probe.probe(0, StartIdentity(0)), Liveness::Dead);
}

#[test]
fn test_terminate_missing_process_is_false() {
    assert!(!terminate(dead_pid()).unwrap());
    assert!(!terminate(0).unwrap());
}

#[cfg(unix)]
#[test]
fn test_terminate_in_own_group_signals_only_the_pid() {
    use std::os::unix::process::ExitStatusExt;

    // The child shares the test's process group; signalling the group
    // would take the test runner down with it.
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();

    assert!(terminate(child.id()).unwrap());
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGTERM));
}

#[cfg(unix)]
#[test]
fn test_terminate_signals_the_holder_group() {
    use std::os::unix::process::{CommandExt, ExitStatusExt};

    let mut child = std::process::Command::new("sh")
        .args(["-c", "sleep 30 & wait"])
        .process_group(0)
        .spawn()
        .unwrap();

    assert!(terminate(child.id()).unwrap());
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGTERM));
}

#[test]
fn test_indeterminate_counts_as_alive() {
    assert!(Liveness::Indeterminate("permission denied".to_string()).is_alive());
    assert!(Liveness::Alive.is_alive());
    assert!(!Liveness::Dead.is_alive());
}

#[test]
fn test_start_identity_serializes_as_integer() {
    let json = serde_json::to_string(&StartIdentity(42)).unwrap();
    assert_eq!(json, "42");
    let parsed: StartIdentity = serde_json::from_str("42").unwrap();
    assert_eq!(parsed, StartIdentity(42));
}

#[cfg(unix)]
mod unix_parsing {
    use super::super::unix::{parse_lstart, parse_proc_stat};
    use super::*;

    fn stat_line(comm: &str, state: &str, starttime: u64) -> String {
        // Fields 4..=21 are filler; field 22 is starttime; a few trailing fields follow.
        let filler: Vec<String> = (4..=21).map(|n| n.to_string()).collect();
        format!(
            "4242 ({}) {} {} {} 0 0 0",
            comm,
            state,
            filler.join(" "),
            starttime
        )
    }

    #[test]
    fn test_parse_proc_stat_reads_starttime() {
        let line = stat_line("sleep", "S", 987654);
        assert_eq!(parse_proc_stat(&line).unwrap(), Some(StartIdentity(987654)));
    }

    #[test]
    fn test_parse_proc_stat_handles_parens_in_command() {
        let line = stat_line("weird) (name", "R", 55);
        assert_eq!(parse_proc_stat(&line).unwrap(), Some(StartIdentity(55)));
    }

    #[test]
    fn test_parse_proc_stat_zombie_is_gone() {
        let line = stat_line("defunct", "Z", 77);
        assert_eq!(parse_proc_stat(&line).unwrap(), None);
    }

    #[test]
    fn test_parse_proc_stat_rejects_truncated_line() {
        assert!(parse_proc_stat("4242 (sleep) S 1 2 3").is_err());
        assert!(parse_proc_stat("garbage").is_err());
    }

    #[test]
    fn test_parse_lstart() {
        let a = parse_lstart("Mon Jan  1 00:00:00 2024").unwrap();
        let b = parse_lstart("Mon Jan 1 00:00:01 2024").unwrap();
        assert_eq!(a, StartIdentity(1_704_067_200));
        assert_eq!(b.0 - a.0, 1);
        assert!(parse_lstart("yesterday").is_err());
    }
}
