//! Unit tests for invocation state transitions.

use crate::relay::domain::{Invocation, InvocationError, InvocationState};
use eyre::{bail, ensure};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

const ALL_STATES: [InvocationState; 8] = [
    InvocationState::Received,
    InvocationState::Validating,
    InvocationState::Transforming,
    InvocationState::Publishing,
    InvocationState::Done,
    InvocationState::Failed,
    InvocationState::ErrorRouted,
    InvocationState::Reraised,
];

const EDGES: [(InvocationState, InvocationState); 9] = [
    (InvocationState::Received, InvocationState::Validating),
    (InvocationState::Validating, InvocationState::Transforming),
    (InvocationState::Transforming, InvocationState::Publishing),
    (InvocationState::Publishing, InvocationState::Done),
    (InvocationState::Validating, InvocationState::Failed),
    (InvocationState::Transforming, InvocationState::Failed),
    (InvocationState::Publishing, InvocationState::Failed),
    (InvocationState::Failed, InvocationState::ErrorRouted),
    (InvocationState::Failed, InvocationState::Reraised),
];

#[fixture]
fn clock() -> DefaultClock {
    DefaultClock
}

#[fixture]
fn invocation(clock: DefaultClock) -> Invocation {
    Invocation::start("message-1", &clock)
}

fn drive(invocation: &mut Invocation, path: &[InvocationState]) -> Result<(), InvocationError> {
    for state in path {
        invocation.transition_to(*state)?;
    }
    Ok(())
}

#[rstest]
fn transition_matrix_has_exactly_the_documented_edges() -> eyre::Result<()> {
    for from in ALL_STATES {
        for to in ALL_STATES {
            let expected = EDGES.contains(&(from, to));
            ensure!(
                from.can_transition_to(to) == expected,
                "{from} -> {to} should be {}",
                if expected { "allowed" } else { "rejected" }
            );
        }
    }
    Ok(())
}

#[rstest]
fn terminal_states_have_no_outgoing_edges() -> eyre::Result<()> {
    for state in ALL_STATES.into_iter().filter(|state| state.is_terminal()) {
        ensure!(ALL_STATES.iter().all(|to| !state.can_transition_to(*to)));
    }
    ensure!(InvocationState::Done.is_terminal());
    ensure!(InvocationState::ErrorRouted.is_terminal());
    ensure!(InvocationState::Reraised.is_terminal());
    ensure!(!InvocationState::Failed.is_terminal());
    Ok(())
}

#[rstest]
fn invocation_starts_received(invocation: Invocation) {
    assert_eq!(invocation.state(), InvocationState::Received);
    assert_eq!(invocation.message_id(), "message-1");
}

#[rstest]
#[case(&[
    InvocationState::Validating,
    InvocationState::Transforming,
    InvocationState::Publishing,
    InvocationState::Done,
])]
#[case(&[InvocationState::Validating, InvocationState::Failed, InvocationState::ErrorRouted])]
#[case(&[
    InvocationState::Validating,
    InvocationState::Transforming,
    InvocationState::Publishing,
    InvocationState::Failed,
    InvocationState::Reraised,
])]
fn lifecycle_paths_reach_a_terminal_state(
    mut invocation: Invocation,
    #[case] path: &[InvocationState],
) -> eyre::Result<()> {
    drive(&mut invocation, path)?;
    ensure!(invocation.state().is_terminal());
    Ok(())
}

#[rstest]
fn rejected_transition_leaves_state_unchanged(mut invocation: Invocation) -> eyre::Result<()> {
    drive(&mut invocation, &[InvocationState::Validating])?;

    let result = invocation.transition_to(InvocationState::Done);

    match result {
        Err(InvocationError::InvalidTransition { from, to, .. }) => {
            ensure!(from == InvocationState::Validating);
            ensure!(to == InvocationState::Done);
        }
        other => bail!("expected InvalidTransition, got {other:?}"),
    }
    ensure!(invocation.state() == InvocationState::Validating);
    Ok(())
}

#[rstest]
fn received_cannot_fail_before_validation(mut invocation: Invocation) {
    let result = invocation.transition_to(InvocationState::Failed);
    assert!(matches!(result, Err(InvocationError::InvalidTransition { .. })));
}

#[rstest]
#[case("received", InvocationState::Received)]
#[case(" Error_Routed ", InvocationState::ErrorRouted)]
#[case("RERAISED", InvocationState::Reraised)]
fn states_parse_from_their_log_form(#[case] text: &str, #[case] expected: InvocationState) {
    assert_eq!(InvocationState::try_from(text).ok(), Some(expected));
}

#[rstest]
fn unknown_state_names_are_rejected() {
    assert!(InvocationState::try_from("finished").is_err());
}
