//! Orchestrator - owns the sandbox subprocess and its channel.
//!
//! ## Lifecycle
//!
//! - **Construction** spawns the subprocess with its stdin/stdout bound to the
//!   remote end of a socket pair and keeps the local end as a [`Channel`].
//! - **Operations** (`create`, `destroy`, `fetch_state`) each write one
//!   request line and block on one response line.
//! - **Teardown** closes the channel first, so a well-behaved subprocess sees
//!   end of input and exits on its own, then waits for it exactly once.
//!
//! ## One Gaolette per channel
//!
//! The `get:state` request names no Gaolette, so a channel can only address
//! one. The orchestrator remembers the id of the Gaolette it created (if any)
//! and refuses operations that would need a second one. Ids are only unique
//! per subprocess, so every Gaolette also carries the identity of the
//! orchestrator that created it.

mod exit;
mod shared;
mod spawn;

pub use exit::ExitDisposition;
pub use shared::SharedOrchestrator;

use crate::channel::{Channel, Line};
use crate::gaolette::Gaolette;
use crate::logging::{LogKind, LogLevel, LogRecord, LogSink, Priority, TracingSink};
use crate::options::OrchestratorOptions;
use crate::util::kill_process;
use gao_shared::errors::{GaoError, GaoResult};
use gao_shared::wire::{self, Command};
use gao_shared::{GaoletteId, GaoletteState, PerfSpec};
use parking_lot::Mutex;
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ORCHESTRATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Client-side owner of one sandbox subprocess.
///
/// Not `Clone`: the subprocess and channel belong to exactly one
/// orchestrator. Calls are strictly request/response; share across threads
/// through [`SharedOrchestrator`].
pub struct Orchestrator {
    /// Process-unique identity stamped on every Gaolette created here.
    id: u64,
    channel: Option<Channel>,
    child: Option<Child>,
    pid: u32,
    /// Gaolette currently held by the subprocess on this channel.
    live: Option<GaoletteId>,
    level: LogLevel,
    sink: Arc<dyn LogSink>,
    kill_target: Arc<Mutex<Option<u32>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("live", &self.live)
            .field("level", &self.level)
            .finish()
    }
}

impl Orchestrator {
    /// Spawn the subprocess, reporting events to `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `Config` for unusable options and `Spawn` if the channel or
    /// the process cannot be created. No subprocess is left behind on error.
    pub fn new(options: OrchestratorOptions) -> GaoResult<Self> {
        Self::with_sink(options, Arc::new(TracingSink))
    }

    /// Spawn the subprocess, reporting events to `sink`.
    pub fn with_sink(options: OrchestratorOptions, sink: Arc<dyn LogSink>) -> GaoResult<Self> {
        options.validate()?;

        let (child, local) = spawn::spawn_subprocess(&options)?;
        let pid = child.id();

        tracing::info!(
            pid = pid,
            binary = %options.binary.display(),
            terminate_with_parent = options.terminate_with_parent,
            "Spawned sandbox subprocess"
        );

        let orchestrator = Self {
            id: NEXT_ORCHESTRATOR_ID.fetch_add(1, Ordering::Relaxed),
            channel: Some(Channel::new(local)),
            child: Some(child),
            pid,
            live: None,
            level: options.log_level,
            sink,
            kill_target: Arc::new(Mutex::new(Some(pid))),
        };
        orchestrator.log(
            LogKind::Notice,
            Priority::Verbose,
            format!("sandbox subprocess started (pid {})", pid),
        );
        Ok(orchestrator)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the subprocess is still running. Reaps it if it has exited;
    /// the exit status is kept for teardown.
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        // Held across the reap so no kill can reach a recycled pid.
        let mut target = self.kill_target.lock();
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => {
                *target = None;
                false
            }
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "Failed to poll sandbox subprocess");
                false
            }
        }
    }

    /// Id of the Gaolette this channel currently addresses, if any.
    pub fn live_gaolette(&self) -> Option<GaoletteId> {
        self.live
    }

    pub fn log_level(&self) -> LogLevel {
        self.level
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    /// Handle that can SIGKILL the subprocess from another thread.
    ///
    /// Requests have no timeout; a watchdog holding this handle is how a
    /// caller bounds the time spent blocked on an unresponsive subprocess.
    pub fn kill_handle(&self) -> KillHandle {
        KillHandle {
            target: Arc::clone(&self.kill_target),
        }
    }

    /// Request a new Gaolette with the given specification.
    ///
    /// # Errors
    ///
    /// - `Creation { code, .. }` for an `ERR:<code>` reply
    /// - `CreationRejected` for an empty or `-1` reply
    /// - `Protocol` for any other unparsable reply
    /// - `InvalidState` if this channel already holds a live Gaolette
    /// - `Transport` if the channel fails
    pub fn create(&mut self, spec: PerfSpec) -> GaoResult<Gaolette> {
        if let Some(id) = self.live {
            return Err(GaoError::InvalidState(format!(
                "gaolette {} is still live on this channel",
                id
            )));
        }

        let line = self.exchange(&Command::Create(spec))?;

        match line.as_str().and_then(wire::parse_create_reply) {
            Ok(id) => {
                self.live = Some(id);
                tracing::info!(pid = self.pid, gaolette_id = id, spec = ?spec, "Gaolette created");
                self.log(
                    LogKind::Success,
                    Priority::Verbose,
                    format!("gaolette {} created", id),
                );
                Ok(Gaolette::operational(self.id, id, spec))
            }
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "Gaolette creation failed");
                self.log(LogKind::Failure, Priority::Always, e.to_string());
                Err(e)
            }
        }
    }

    /// Tear down a Gaolette.
    ///
    /// Returns `Ok(true)` once the subprocess acknowledges; the Gaolette then
    /// holds the unassigned id and `ShutDown`. Returns `Ok(false)` if the
    /// subprocess answered anything else, leaving the Gaolette untouched.
    /// Destroying an already shut down Gaolette succeeds without a request.
    ///
    /// An ill-formed Gaolette still holds its id and slot; destroying it is
    /// how the slot is released.
    ///
    /// # Errors
    ///
    /// `InvalidState` for a Gaolette this channel does not address;
    /// `Transport` if the channel fails (Gaolette untouched).
    pub fn destroy(&mut self, gaolette: &mut Gaolette) -> GaoResult<bool> {
        if gaolette.state() == GaoletteState::ShutDown {
            tracing::debug!(pid = self.pid, "Gaolette already shut down");
            return Ok(true);
        }
        self.ensure_addressed(gaolette)?;

        let id = gaolette.id();
        let line = self.exchange(&Command::Destroy(id))?;
        let acknowledged = line.as_str().map(wire::is_destroy_ack).unwrap_or(false);

        if acknowledged {
            gaolette.mark_shut_down();
            self.live = None;
            tracing::info!(pid = self.pid, gaolette_id = id, "Gaolette destroyed");
            self.log(
                LogKind::Success,
                Priority::Verbose,
                format!("gaolette {} destroyed", id),
            );
        } else {
            tracing::warn!(
                pid = self.pid,
                gaolette_id = id,
                response = %String::from_utf8_lossy(line.as_bytes()),
                "Gaolette destroy refused"
            );
            self.log(
                LogKind::Failure,
                Priority::Always,
                format!("subprocess refused to destroy gaolette {}", id),
            );
        }
        Ok(acknowledged)
    }

    /// Refresh a Gaolette's state from the subprocess.
    ///
    /// A reply that cannot be mapped to a state marks the Gaolette
    /// `Illformed` and returns the protocol violation. An `ERR` reply leaves
    /// the state untouched and returns `OperationFailed`. A reported
    /// `ShutDown` is recorded as a completed teardown.
    pub fn fetch_state(&mut self, gaolette: &mut Gaolette) -> GaoResult<GaoletteState> {
        if gaolette.is_terminal() {
            return Err(GaoError::InvalidState(format!(
                "gaolette is {} and cannot be queried",
                gaolette.state()
            )));
        }
        self.ensure_addressed(gaolette)?;

        let id = gaolette.id();
        let line = self.exchange(&Command::QueryState)?;

        match line.as_str().and_then(wire::parse_state_reply) {
            Ok(GaoletteState::ShutDown) => {
                gaolette.mark_shut_down();
                self.live = None;
                self.log(
                    LogKind::Notice,
                    Priority::Always,
                    format!("gaolette {} was shut down by the subprocess", id),
                );
                Ok(GaoletteState::ShutDown)
            }
            Ok(state) => {
                let previous = gaolette.state();
                gaolette.set_state(state);
                tracing::debug!(gaolette_id = id, from = %previous, to = %state, "Gaolette state fetched");
                if state == GaoletteState::Illformed {
                    self.log(
                        LogKind::Warning,
                        Priority::Always,
                        format!("subprocess reports gaolette {} as ill-formed", id),
                    );
                }
                Ok(state)
            }
            Err(e) if e.is_protocol_violation() => {
                gaolette.set_state(GaoletteState::Illformed);
                tracing::warn!(gaolette_id = id, error = %e, "Unparsable state reply");
                self.log(
                    LogKind::Failure,
                    Priority::Always,
                    format!("gaolette {} marked ill-formed: {}", id, e),
                );
                Err(e)
            }
            Err(e) => {
                self.log(LogKind::Failure, Priority::Always, e.to_string());
                Err(e)
            }
        }
    }

    /// Close the channel, wait for the subprocess and report how it ended.
    pub fn shutdown(mut self) -> ExitDisposition {
        self.teardown().unwrap_or(ExitDisposition::Undetermined)
    }

    fn ensure_addressed(&self, gaolette: &Gaolette) -> GaoResult<()> {
        if gaolette.owner() != self.id || self.live != Some(gaolette.id()) {
            return Err(GaoError::InvalidState(format!(
                "gaolette {} is not addressed by this channel",
                gaolette.id()
            )));
        }
        Ok(())
    }

    /// One request line out, one response line back.
    fn exchange(&mut self, command: &Command) -> GaoResult<Line> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| GaoError::InvalidState("orchestrator is shut down".into()))?;

        let request = command.encode();
        channel.write_line(&request)?;
        let line = channel.read_line()?;

        tracing::debug!(
            pid = self.pid,
            request = %request,
            response = %String::from_utf8_lossy(line.as_bytes()),
            end = ?line.end(),
            "Exchange complete"
        );

        if line.is_truncated() {
            self.log(
                LogKind::Warning,
                Priority::Always,
                format!("response to {:?} was truncated at {} bytes", request, line.len()),
            );
        }
        Ok(line)
    }

    fn teardown(&mut self) -> Option<ExitDisposition> {
        let mut child = self.child.take()?;

        if let Some(id) = self.live {
            self.log(
                LogKind::Warning,
                Priority::Always,
                format!("gaolette {} still live at shutdown", id),
            );
        }

        // Close first: end of input lets the subprocess exit on its own.
        drop(self.channel.take());
        tracing::debug!(pid = self.pid, "Channel closed, waiting for sandbox subprocess");

        // Clear the kill target while the exited child is still a zombie;
        // once reaped its pid may be recycled.
        if let Err(e) = exit::wait_exited(&child) {
            tracing::warn!(pid = self.pid, error = %e, "Failed to wait for sandbox subprocess exit");
        }
        *self.kill_target.lock() = None;
        let disposition = exit::reap(&mut child);

        tracing::info!(pid = self.pid, disposition = %disposition, "Sandbox subprocess reaped");
        let (kind, priority) = if disposition.is_clean() {
            (LogKind::Notice, Priority::Verbose)
        } else {
            (LogKind::Warning, Priority::Always)
        };
        self.log(
            kind,
            priority,
            format!("sandbox subprocess {} {}", self.pid, disposition),
        );

        Some(disposition)
    }

    fn log(&self, kind: LogKind, priority: Priority, message: String) {
        if self.level.admits(priority) {
            self.sink.emit(&LogRecord::new(kind, priority, message));
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Kills the subprocess of an [`Orchestrator`] from any thread.
///
/// Inert once the orchestrator has reaped its subprocess.
#[derive(Debug, Clone)]
pub struct KillHandle {
    target: Arc<Mutex<Option<u32>>>,
}

impl KillHandle {
    /// SIGKILL the subprocess. Returns `false` if it was already reaped or
    /// could not be signalled.
    pub fn kill(&self) -> bool {
        match *self.target.lock() {
            Some(pid) => {
                tracing::warn!(pid = pid, "Killing sandbox subprocess");
                kill_process(pid)
            }
            None => false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        *self.target.lock()
    }
}

// Compile-time assertions: movable to, and shareable behind a lock on, other threads.
const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send::<Orchestrator>;
    let _ = assert_send_sync::<KillHandle>;
};
