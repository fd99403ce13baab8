use std::fmt;

use thiserror::Error;

/// Lifecycle phase of one paged list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    LoadingInitial,
    LoadingMore,
    Loaded,
    Exhausted,
    Failed,
}

impl Phase {
    pub fn is_loading(self) -> bool {
        matches!(self, Self::LoadingInitial | Self::LoadingMore)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingInitial => "loading_initial",
            Self::LoadingMore => "loading_more",
            Self::Loaded => "loaded",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} while {current}")]
pub struct PhaseError {
    pub current: Phase,
    pub action: &'static str,
}

const SETTLED: [Phase; 4] = [Phase::Idle, Phase::Loaded, Phase::Exhausted, Phase::Failed];

/// Phase transitions allowed for a paged list.
///
/// ```text
/// Idle -> LoadingInitial -> Loaded <-> LoadingMore -> Loaded | Exhausted | Failed
/// ```
/// `Failed` is reachable from either loading phase. Any resting phase may
/// restart with an initial load or a refresh.
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    phase: Phase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Start a first-page fetch from any resting phase. Callers only do this
    /// while the list holds no items.
    pub fn begin_initial(&mut self) -> Result<(), PhaseError> {
        self.transition_from_any_of(&SETTLED, Phase::LoadingInitial, "begin_initial")
    }

    pub fn begin_more(&mut self) -> Result<(), PhaseError> {
        self.transition_from_state(Phase::Loaded, Phase::LoadingMore, "begin_more")
    }

    pub fn begin_refresh(&mut self) -> Result<(), PhaseError> {
        self.transition_from_any_of(&SETTLED, Phase::LoadingInitial, "begin_refresh")
    }

    pub fn begin_reload(&mut self) -> Result<(), PhaseError> {
        self.transition_from_any_of(
            &[Phase::Loaded, Phase::Exhausted],
            Phase::LoadingMore,
            "begin_reload",
        )
    }

    /// Leave `Failed` for the loading phase of the attempt being repeated.
    pub fn retry_into(&mut self, loading: Phase) -> Result<(), PhaseError> {
        if !loading.is_loading() {
            return Err(PhaseError {
                current: self.phase,
                action: "retry",
            });
        }
        self.transition_from_state(Phase::Failed, loading, "retry")
    }

    /// Finish the in-flight load with a resting phase.
    pub fn settle(&mut self, next: Phase) -> Result<(), PhaseError> {
        if next.is_loading() || next == Phase::Idle {
            return Err(PhaseError {
                current: self.phase,
                action: "settle",
            });
        }
        self.transition_from_any_of(
            &[Phase::LoadingInitial, Phase::LoadingMore],
            next,
            "settle",
        )
    }

    fn transition_from_state(
        &mut self,
        expected: Phase,
        next: Phase,
        action: &'static str,
    ) -> Result<(), PhaseError> {
        self.transition_from_any_of(&[expected], next, action)
    }

    fn transition_from_any_of(
        &mut self,
        allowed: &[Phase],
        next: Phase,
        action: &'static str,
    ) -> Result<(), PhaseError> {
        if !allowed.contains(&self.phase) {
            return Err(PhaseError {
                current: self.phase,
                action,
            });
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_then_more_then_exhausted() {
        let mut machine = PhaseMachine::new();
        machine.begin_initial().expect("idle -> loading");
        machine.settle(Phase::Loaded).expect("loaded");
        machine.begin_more().expect("loaded -> more");
        machine.settle(Phase::Exhausted).expect("exhausted");

        assert_eq!(machine.phase(), Phase::Exhausted);
    }

    #[test]
    fn rejects_load_more_unless_loaded() {
        let mut machine = PhaseMachine::new();
        let err = machine.begin_more().expect_err("idle");
        assert_eq!(
            err,
            PhaseError {
                current: Phase::Idle,
                action: "begin_more"
            }
        );

        machine.begin_initial().expect("idle -> loading");
        assert!(machine.begin_more().is_err());
        assert!(machine.begin_initial().is_err());
    }

    #[test]
    fn failed_is_reenterable_through_retry() {
        let mut machine = PhaseMachine::new();
        machine.begin_initial().expect("idle -> loading");
        machine.settle(Phase::Failed).expect("failed");
        machine
            .retry_into(Phase::LoadingInitial)
            .expect("failed -> loading");
        machine.settle(Phase::Loaded).expect("loaded");

        assert_eq!(machine.phase(), Phase::Loaded);
        assert!(machine.retry_into(Phase::LoadingMore).is_err());
    }

    #[test]
    fn initial_load_restarts_from_any_resting_phase() {
        for resting in [Phase::Loaded, Phase::Exhausted, Phase::Failed] {
            let mut machine = PhaseMachine::new();
            machine.begin_initial().expect("idle -> loading");
            machine.settle(resting).expect("settled");
            machine.begin_initial().expect("resting -> loading");
            assert_eq!(machine.phase(), Phase::LoadingInitial);
        }

        let mut machine = PhaseMachine::new();
        machine.begin_initial().expect("idle -> loading");
        machine.settle(Phase::Loaded).expect("loaded");
        machine.begin_more().expect("loaded -> more");
        assert_eq!(
            machine.begin_initial(),
            Err(PhaseError {
                current: Phase::LoadingMore,
                action: "begin_initial"
            })
        );
    }

    #[test]
    fn settle_requires_a_load_in_flight() {
        let mut machine = PhaseMachine::new();
        assert!(machine.settle(Phase::Loaded).is_err());

        machine.begin_initial().expect("idle -> loading");
        assert!(machine.settle(Phase::LoadingMore).is_err());
        assert!(machine.settle(Phase::Idle).is_err());
    }

    #[test]
    fn reload_and_refresh_start_from_settled_phases() {
        let mut machine = PhaseMachine::new();
        assert!(machine.begin_reload().is_err());
        machine.begin_refresh().expect("idle refresh");
        machine.settle(Phase::Exhausted).expect("exhausted");
        machine.begin_reload().expect("exhausted -> reload");
        assert_eq!(machine.phase(), Phase::LoadingMore);
        assert!(machine.begin_refresh().is_err());
    }

    #[test]
    fn error_message_names_action_and_phase() {
        let err = PhaseError {
            current: Phase::LoadingMore,
            action: "begin_more",
        };
        assert_eq!(err.to_string(), "cannot begin_more while loading_more");
    }
}
