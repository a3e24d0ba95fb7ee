//! Subprocess execution with merged output capture, wall-clock deadlines
//! and child CPU-time accounting.
//!
//! Both stdio streams of the child are routed into one anonymous pipe so
//! the captured buffer interleaves stdout and stderr in the order the
//! child produced them. The child is reaped with `wait4(2)` so its user
//! and system CPU times are available; wall-clock noise from co-tenant
//! load never enters a measurement.

use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug)]
pub struct CmdOutput {
    /// Merged stdout + stderr.
    pub output: Vec<u8>,
    /// Child user + system CPU time.
    pub cpu_time: Duration,
}

#[derive(Error, Debug)]
pub enum CmdError {
    #[error("timeout")]
    Timeout { output: Vec<u8> },

    /// Non-zero exit; the message carries the tool's own diagnostics.
    #[error("{}", String::from_utf8_lossy(.output))]
    Failed { output: Vec<u8> },

    #[error("failed to spawn: {0}")]
    Spawn(#[from] io::Error),
}

/// Run `cmd` to completion, or until `timeout` expires.
///
/// `None` waits indefinitely. On expiry the child's process group is
/// killed and the output captured so far is returned inside the error.
pub fn run_command(mut cmd: Command, timeout: Option<Duration>) -> Result<CmdOutput, CmdError> {
    let (reader, writer) = io::pipe()?;
    cmd.stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer)
        .process_group(0);

    let child = cmd.spawn()?;
    // Release the parent's copies of the pipe writer so the collector
    // sees EOF once the child (and its descendants) exit.
    drop(cmd);

    let pid = child.id() as libc::pid_t;

    let collector = thread::spawn(move || {
        let mut reader = reader;
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    });

    let (tx, rx) = mpsc::channel();
    let reaper = thread::spawn(move || {
        // Hold the handle until the process is reaped.
        let _child = child;
        let mut status: libc::c_int = 0;
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        let _ = tx.send((rc, status, usage));
    });

    let (rc, status, usage, timed_out) = match timeout {
        None => {
            let (rc, status, usage) = rx.recv().expect("child reaper exited without reporting");
            (rc, status, usage, false)
        }
        Some(limit) => match rx.recv_timeout(limit) {
            Ok((rc, status, usage)) => (rc, status, usage, false),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                unsafe {
                    libc::kill(-pid, libc::SIGKILL);
                }
                let (rc, status, usage) =
                    rx.recv().expect("child reaper exited without reporting");
                (rc, status, usage, true)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                panic!("child reaper exited without reporting")
            }
        },
    };
    let _ = reaper.join();
    let output = collector.join().unwrap_or_default();

    if timed_out {
        return Err(CmdError::Timeout { output });
    }

    let exited_ok = rc == pid && libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0;
    if !exited_ok {
        return Err(CmdError::Failed { output });
    }

    let cpu_time = timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime);
    Ok(CmdOutput { output, cpu_time })
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::new(tv.tv_sec.max(0) as u64, (tv.tv_usec.max(0) as u32) * 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_stderr_merged() {
        let out = run_command(sh("echo one; echo two >&2; echo three"), None).unwrap();
        assert_eq!(out.output, b"one\ntwo\nthree\n");
    }

    #[test]
    fn failure_carries_the_captured_output() {
        let err = run_command(sh("echo broken tool >&2; exit 3"), None).unwrap_err();
        match err {
            CmdError::Failed { output } => {
                assert_eq!(output, b"broken tool\n");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // the Display form is the diagnostic itself
        let err = run_command(sh("echo broken tool >&2; exit 3"), None).unwrap_err();
        assert_eq!(err.to_string(), "broken tool\n");
    }

    #[test]
    fn deadline_kills_the_child() {
        let start = Instant::now();
        let err = run_command(sh("echo early; sleep 30"), Some(Duration::from_millis(200)));
        let elapsed = start.elapsed();
        assert!(elapsed < Duration::from_secs(5), "kill took {elapsed:?}");
        match err.unwrap_err() {
            CmdError::Timeout { output } => assert_eq!(output, b"early\n"),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn reports_child_cpu_time() {
        let out = run_command(
            sh("i=0; while [ $i -lt 200000 ]; do i=$((i+1)); done"),
            None,
        )
        .unwrap();
        assert!(out.cpu_time > Duration::ZERO);
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let cmd = Command::new("/definitely/not/here");
        assert!(matches!(
            run_command(cmd, None),
            Err(CmdError::Spawn(_))
        ));
    }
}
