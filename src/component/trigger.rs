//! Pure transition rules for the component trigger state machine.
//!
//! [`evaluate`] maps (current state, command, sibling states) to the next
//! state plus a [`TriggerOutcome`] telling the graph walk what to do next.
//! It never touches the component itself, so every rule is testable in
//! isolation and the walk stays free of hidden side channels: when a
//! fan-in node substitutes the command delivered to its remaining siblings
//! (deliver `Pause` instead of `Stop` because a sibling was paused, not
//! stopped), the substitution is visible in the returned value.

use crate::component::{ComponentState, TriggerCommand};
use crate::error::{Error, Result};

use ComponentState as S;
use TriggerCommand as C;

/// What a graph walk should do after a component transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Keep walking, delivering this command to the next components.
    ///
    /// Usually the command that arrived; a fan node or a paused resume
    /// substitutes a different one.
    Propagate(TriggerCommand),
    /// Stop walking this branch; the states beyond it already converged.
    PathStop,
}

/// Evaluate `cmd` against `state`.
///
/// `sources` and `sinks` are the states of the components feeding into and
/// fed by the transitioning node, including any that already transitioned
/// earlier in the same walk. They only matter for fan-in (more than one
/// source) and fan-out (more than one sink) nodes; a joint rule keeps such
/// a node `Active` while any sibling still is, and keeps it `Paused` while
/// more than one sibling is.
pub fn evaluate(
    state: ComponentState,
    cmd: TriggerCommand,
    sources: &[ComponentState],
    sinks: &[ComponentState],
) -> Result<(ComponentState, TriggerOutcome)> {
    use TriggerOutcome::{PathStop, Propagate};

    let siblings: Option<&[ComponentState]> = if sources.len() > 1 {
        Some(sources)
    } else if sinks.len() > 1 {
        Some(sinks)
    } else {
        None
    };

    let next = match (state, cmd) {
        // always allowed, terminal for the command
        (_, C::Reset) => (S::Ready, Propagate(C::Reset)),
        (_, C::Xrun) => (S::Ready, Propagate(C::Xrun)),

        (S::Ready, C::Prepare) => (S::Prepare, Propagate(C::Prepare)),
        (S::Prepare | S::PreActive | S::Active | S::Paused, C::Prepare) => (state, PathStop),

        (S::Prepare, C::PreStart) => (S::PreActive, Propagate(C::PreStart)),
        // resuming from pause: siblings must receive the release form
        (S::Paused, C::PreStart) => (S::PreActive, Propagate(C::PreRelease)),
        (S::PreActive | S::Active, C::PreStart) => (state, PathStop),

        (S::PreActive, C::Start) => (S::Active, Propagate(C::Start)),
        (S::Active, C::Start) => (state, PathStop),

        (S::PreActive, C::Release) => (S::Active, Propagate(C::Release)),
        (S::Active, C::Release) => (state, PathStop),

        (S::Paused, C::PreRelease) => (S::PreActive, Propagate(C::PreRelease)),
        (S::PreActive | S::Active, C::PreRelease) => (state, PathStop),

        (S::Active, C::Pause) => match siblings {
            Some(sb) if count(sb, S::Active) > 0 || count(sb, S::Paused) >= 2 => {
                (state, PathStop)
            }
            _ => (S::Paused, Propagate(C::Pause)),
        },
        (S::Paused, C::Pause) => (state, PathStop),

        (S::Active, C::Stop) => match siblings {
            Some(sb) if count(sb, S::Active) > 0 => (state, PathStop),
            Some(sb) if count(sb, S::Paused) > 0 => (S::Paused, Propagate(C::Pause)),
            _ => (S::Prepare, Propagate(C::Stop)),
        },
        (S::Paused, C::Stop) => match siblings {
            Some(sb) if count(sb, S::Paused) > 1 => (state, PathStop),
            _ => (S::Prepare, Propagate(C::Stop)),
        },
        (S::Prepare | S::Ready, C::Stop) => (state, PathStop),

        _ => return Err(Error::InvalidTransition { state, cmd }),
    };
    Ok(next)
}

fn count(states: &[ComponentState], wanted: ComponentState) -> usize {
    states.iter().filter(|s| **s == wanted).count()
}

#[cfg(test)]
mod tests {
    use super::TriggerOutcome::{PathStop, Propagate};
    use super::*;

    #[test]
    fn test_three_source_mixer_stop_sequence() {
        // mixer fed by sources in {Active, Active, Paused}; one source just
        // stopped, so the mixer sees {Prepare, Active, Paused}
        let (next, out) = evaluate(
            S::Active,
            C::Stop,
            &[S::Prepare, S::Active, S::Paused],
            &[S::Active],
        )
        .unwrap();
        assert_eq!(next, S::Active);
        assert_eq!(out, PathStop);

        // last active source stops: mixer goes Paused and the remaining
        // paused sibling must be delivered Pause, not Stop
        let (next, out) = evaluate(
            S::Active,
            C::Stop,
            &[S::Prepare, S::Prepare, S::Paused],
            &[S::Active],
        )
        .unwrap();
        assert_eq!(next, S::Paused);
        assert_eq!(out, Propagate(C::Pause));
    }

    #[test]
    fn test_path_stop_is_idempotent() {
        let sources = [S::Prepare, S::Active, S::Paused];
        for _ in 0..2 {
            let (next, out) = evaluate(S::Active, C::Stop, &sources, &[S::Active]).unwrap();
            assert_eq!(next, S::Active);
            assert_eq!(out, PathStop);
        }
    }

    #[test]
    fn test_fan_in_stop_with_no_siblings_left() {
        let (next, out) =
            evaluate(S::Active, C::Stop, &[S::Prepare, S::Prepare], &[S::Active]).unwrap();
        assert_eq!(next, S::Prepare);
        assert_eq!(out, Propagate(C::Stop));
    }

    #[test]
    fn test_pause_held_back_while_two_siblings_paused() {
        let (next, out) =
            evaluate(S::Active, C::Pause, &[S::Paused, S::Paused], &[S::Active]).unwrap();
        assert_eq!(next, S::Active);
        assert_eq!(out, PathStop);
    }

    #[test]
    fn test_fan_out_mirrors_fan_in() {
        let (next, out) =
            evaluate(S::Active, C::Stop, &[S::Prepare], &[S::Active, S::Prepare]).unwrap();
        assert_eq!(next, S::Active);
        assert_eq!(out, PathStop);
    }

    #[test]
    fn test_paused_prestart_substitutes_prerelease() {
        let (next, out) = evaluate(S::Paused, C::PreStart, &[], &[]).unwrap();
        assert_eq!(next, S::PreActive);
        assert_eq!(out, Propagate(C::PreRelease));
    }

    #[test]
    fn test_xrun_forces_ready_from_any_state() {
        for state in [S::Init, S::Ready, S::Prepare, S::PreActive, S::Active, S::Paused] {
            let (next, _) = evaluate(state, C::Xrun, &[], &[]).unwrap();
            assert_eq!(next, S::Ready);
        }
    }

    #[test]
    fn test_invalid_pairs_error() {
        assert!(evaluate(S::Init, C::Start, &[], &[]).is_err());
        assert!(evaluate(S::Ready, C::Pause, &[], &[]).is_err());
        assert!(evaluate(S::PreActive, C::Stop, &[], &[]).is_err());
    }
}
