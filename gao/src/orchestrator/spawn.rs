//! Subprocess spawning with the channel wired to its stdin/stdout.

use crate::options::OrchestratorOptions;
use gao_shared::errors::{GaoError, GaoResult};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::process::{Child, Command, Stdio};

/// Spawns the sandbox executable with both stdin and stdout duplicated from
/// one end of a Unix socket pair.
///
/// # Returns
/// * `Ok((Child, UnixStream))` - The subprocess and the local channel endpoint
/// * `Err(GaoError::Spawn)` - Socket pair creation or spawn failed; nothing
///   is left running
pub(crate) fn spawn_subprocess(options: &OrchestratorOptions) -> GaoResult<(Child, UnixStream)> {
    let (local, remote) = UnixStream::pair()
        .map_err(|e| GaoError::Spawn(format!("failed to create channel socket pair: {}", e)))?;
    let remote_stdin = remote
        .try_clone()
        .map_err(|e| GaoError::Spawn(format!("failed to duplicate channel endpoint: {}", e)))?;

    let mut cmd = Command::new(&options.binary);
    cmd.args(&options.args);
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    // Pass RUST_LOG to subprocess if set and not overridden
    if !options.env.iter().any(|(k, _)| k == "RUST_LOG")
        && let Ok(rust_log) = std::env::var("RUST_LOG")
    {
        cmd.env("RUST_LOG", rust_log);
    }

    cmd.stdin(Stdio::from(OwnedFd::from(remote_stdin)));
    cmd.stdout(Stdio::from(OwnedFd::from(remote)));
    // stderr stays inherited so subprocess diagnostics reach the host's logs
    cmd.stderr(Stdio::inherit());

    if options.terminate_with_parent {
        terminate_with_parent(&mut cmd);
    }

    // `cmd` owns the remote endpoint; it is closed in this process when `cmd`
    // drops at the end of this function, leaving the child as its only holder.
    let child = cmd.spawn().map_err(|e| {
        let err_msg = format!(
            "failed to spawn sandbox subprocess at {}: {}",
            options.binary.display(),
            e
        );
        tracing::error!("{}", err_msg);
        GaoError::Spawn(err_msg)
    })?;

    Ok((child, local))
}

/// Ask the kernel to SIGKILL the subprocess when this process dies.
///
/// Runs between fork and exec, so only async-signal-safe calls are allowed.
#[cfg(target_os = "linux")]
fn terminate_with_parent(cmd: &mut Command) {
    use nix::sys::prctl;
    use nix::sys::signal::Signal;
    use nix::unistd::{getpid, getppid};
    use std::os::unix::process::CommandExt;

    let parent = getpid();
    unsafe {
        cmd.pre_exec(move || {
            prctl::set_pdeathsig(Signal::SIGKILL)?;
            // The parent may have died before the death signal was armed.
            if getppid() != parent {
                return Err(std::io::Error::from_raw_os_error(libc::ESRCH));
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn terminate_with_parent(_cmd: &mut Command) {
    tracing::warn!("terminate_with_parent is not supported on this platform; subprocess may outlive its parent");
}
