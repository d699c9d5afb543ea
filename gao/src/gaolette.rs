//! Client-side mirror of a subprocess-managed sandbox.

use gao_shared::{GaoletteId, GaoletteState, PerfSpec, UNASSIGNED_ID};

/// A Gaolette as the client last observed it.
///
/// Obtained from [`Orchestrator::create`](crate::Orchestrator::create) and
/// mutated only by orchestrator operations. The subprocess owns the actual
/// resources; this value holds the identifier plus a cached belief about
/// their state.
///
/// Invariant: an id of [`UNASSIGNED_ID`] implies a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gaolette {
    /// Orchestrator that created it. Ids are only unique per subprocess.
    owner: u64,
    id: GaoletteId,
    state: GaoletteState,
    spec: PerfSpec,
}

impl Gaolette {
    pub(crate) fn operational(owner: u64, id: GaoletteId, spec: PerfSpec) -> Self {
        debug_assert!(id != UNASSIGNED_ID);
        Self {
            owner,
            id,
            state: GaoletteState::Operational,
            spec,
        }
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    pub fn id(&self) -> GaoletteId {
        self.id
    }

    pub fn state(&self) -> GaoletteState {
        self.state
    }

    /// The specification requested at creation.
    pub fn spec(&self) -> &PerfSpec {
        &self.spec
    }

    pub fn is_assigned(&self) -> bool {
        self.id != UNASSIGNED_ID
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Record a confirmed teardown.
    pub(crate) fn mark_shut_down(&mut self) {
        self.id = UNASSIGNED_ID;
        self.state = GaoletteState::ShutDown;
    }

    /// Record a state the subprocess reported, or `Illformed` after a bad reply.
    pub(crate) fn set_state(&mut self, state: GaoletteState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gao_shared::MemoryPolicy;

    #[test]
    fn test_new_gaolette_is_operational() {
        let spec = PerfSpec::new(1 << 20, MemoryPolicy::Static);
        let gaolette = Gaolette::operational(1, 5, spec);
        assert_eq!(gaolette.owner(), 1);
        assert_eq!(gaolette.id(), 5);
        assert_eq!(gaolette.state(), GaoletteState::Operational);
        assert_eq!(gaolette.spec(), &spec);
        assert!(gaolette.is_assigned());
        assert!(!gaolette.is_terminal());
    }

    #[test]
    fn test_shut_down_clears_id() {
        let mut gaolette = Gaolette::operational(1, 5, PerfSpec::default());
        gaolette.mark_shut_down();
        assert_eq!(gaolette.id(), UNASSIGNED_ID);
        assert_eq!(gaolette.state(), GaoletteState::ShutDown);
        assert!(gaolette.is_terminal());
    }
}
