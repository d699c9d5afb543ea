//! Subprocess reaping and exit classification.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ExitStatus};

/// How the sandbox subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    /// Normal exit with this status code.
    Exited(i32),
    /// Terminated by this signal.
    Signaled(i32),
    /// The wait failed or the status was neither an exit nor a signal.
    Undetermined,
}

impl ExitDisposition {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            ExitDisposition::Exited(code)
        } else if let Some(signal) = status.signal() {
            ExitDisposition::Signaled(signal)
        } else {
            ExitDisposition::Undetermined
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, ExitDisposition::Exited(0))
    }
}

impl std::fmt::Display for ExitDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitDisposition::Exited(code) => write!(f, "exited with status {}", code),
            ExitDisposition::Signaled(signal) => write!(f, "killed by signal {}", signal),
            ExitDisposition::Undetermined => f.write_str("exited with unknown status"),
        }
    }
}

/// Block until the child has exited without reaping it, so its pid stays
/// reserved. A child that was already reaped counts as exited.
pub(crate) fn wait_exited(child: &Child) -> io::Result<()> {
    // SAFETY: siginfo_t is plain data; an all-zero value is valid.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: `info` outlives the call and WNOWAIT leaves the child waitable.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                child.id() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::ECHILD) => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Block until the child exits. Exactly one wait is attempted.
pub(crate) fn reap(child: &mut Child) -> ExitDisposition {
    match child.wait() {
        Ok(status) => ExitDisposition::from_status(status),
        Err(e) => {
            tracing::warn!(pid = child.id(), error = %e, "Failed to wait for sandbox subprocess");
            ExitDisposition::Undetermined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_exit() {
        assert_eq!(
            ExitDisposition::from_status(ExitStatus::from_raw(0)),
            ExitDisposition::Exited(0)
        );
        assert_eq!(
            ExitDisposition::from_status(ExitStatus::from_raw(3 << 8)),
            ExitDisposition::Exited(3)
        );
    }

    #[test]
    fn test_signaled() {
        assert_eq!(
            ExitDisposition::from_status(ExitStatus::from_raw(libc::SIGKILL)),
            ExitDisposition::Signaled(libc::SIGKILL)
        );
    }

    #[test]
    fn test_stopped_status_is_undetermined() {
        // WIFSTOPPED encoding: stop signal in the high byte, 0x7f in the low byte.
        let stopped = (libc::SIGSTOP << 8) | 0x7f;
        assert_eq!(
            ExitDisposition::from_status(ExitStatus::from_raw(stopped)),
            ExitDisposition::Undetermined
        );
    }

    #[test]
    fn test_wait_exited_leaves_child_reapable() {
        let mut child = std::process::Command::new("/bin/sh")
            .arg("-c")
            .arg("exit 5")
            .spawn()
            .unwrap();

        wait_exited(&child).unwrap();
        // Still a zombie: the status has not been collected yet.
        assert!(crate::util::is_process_alive(child.id()));
        assert_eq!(reap(&mut child), ExitDisposition::Exited(5));
        // Reaped children are treated as exited.
        wait_exited(&child).unwrap();
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitDisposition::Exited(2).to_string(), "exited with status 2");
        assert_eq!(ExitDisposition::Signaled(9).to_string(), "killed by signal 9");
        assert_eq!(
            ExitDisposition::Undetermined.to_string(),
            "exited with unknown status"
        );
    }
}
