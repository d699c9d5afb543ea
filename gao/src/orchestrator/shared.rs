//! Lock-serialized orchestrator for multi-threaded callers.

use super::{KillHandle, Orchestrator};
use crate::gaolette::Gaolette;
use gao_shared::errors::GaoResult;
use gao_shared::{GaoletteState, PerfSpec};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to one [`Orchestrator`].
///
/// The channel has no request ids, so interleaved exchanges could not be told
/// apart. Every call holds the lock for its whole write-then-read exchange.
#[derive(Clone)]
pub struct SharedOrchestrator {
    inner: Arc<Mutex<Orchestrator>>,
    kill: KillHandle,
}

impl std::fmt::Debug for SharedOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedOrchestrator")
            .field("pid", &self.kill.pid())
            .finish()
    }
}

impl SharedOrchestrator {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let kill = orchestrator.kill_handle();
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
            kill,
        }
    }

    pub fn create(&self, spec: PerfSpec) -> GaoResult<Gaolette> {
        self.inner.lock().create(spec)
    }

    pub fn destroy(&self, gaolette: &mut Gaolette) -> GaoResult<bool> {
        self.inner.lock().destroy(gaolette)
    }

    pub fn fetch_state(&self, gaolette: &mut Gaolette) -> GaoResult<GaoletteState> {
        self.inner.lock().fetch_state(gaolette)
    }

    /// Usable while another thread is blocked inside a call.
    pub fn kill_handle(&self) -> KillHandle {
        self.kill.clone()
    }

    /// Exclusive access for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, Orchestrator> {
        self.inner.lock()
    }

    /// Recover the orchestrator if this is the last handle.
    pub fn try_unwrap(self) -> Result<Orchestrator, Self> {
        let kill = self.kill;
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner, kill })
    }
}
