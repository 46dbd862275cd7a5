//! Pure state derivation from process events.

use super::types::{ProcessEvent, ProcessEventKind, ProcessState};

/// Transforms state one event at a time.
///
/// This is the only place state transitions are defined. It must be a
/// pure function: (State, Event) -> State.
pub trait Reducer {
    type State;
    type Event;

    fn reduce(state: Self::State, event: &Self::Event) -> Self::State;
}

/// `started → Running`, `stopped → Stopped`, `terminated → Terminated`.
/// Any other kind leaves the state as it was.
pub struct ProcessStateReducer;

impl Reducer for ProcessStateReducer {
    type State = ProcessState;
    type Event = ProcessEvent;

    fn reduce(state: Self::State, event: &Self::Event) -> Self::State {
        match event.kind() {
            ProcessEventKind::Started => ProcessState::Running,
            ProcessEventKind::Stopped => ProcessState::Stopped,
            ProcessEventKind::Terminated => ProcessState::Terminated,
            _ => state,
        }
    }
}

/// Replay `events` in timestamp order, starting from `initial`.
///
/// The sort is stable, so events sharing a timestamp replay in the order
/// given.
pub fn fold(events: &[ProcessEvent], initial: ProcessState) -> ProcessState {
    let mut ordered: Vec<&ProcessEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.timestamp());
    ordered
        .into_iter()
        .fold(initial, |state, event| ProcessStateReducer::reduce(state, event))
}
