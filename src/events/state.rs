use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use super::reducer::{fold, ProcessStateReducer, Reducer};
use super::types::{ProcessEvent, ProcessState};

/// Event history that violates the ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("Process state must have at least one event")]
    NoEvents,

    #[error("Events are not in chronological order (event {index} is older than the one before it)")]
    OutOfOrder { index: usize },

    #[error("Event '{kind}' for process {process_id} is older than the last recorded event")]
    StaleAppend { process_id: u32, kind: String },
}

/// Current state of one process, derived entirely from its events.
///
/// There is no way to set `state` directly; it is always the fold of
/// `events` starting from [`ProcessState::Created`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStateData {
    state: ProcessState,
    process_id: u32,
    events: Vec<ProcessEvent>,
    last_updated: SystemTime,
}

impl ProcessStateData {
    pub fn from_events(process_id: u32, events: Vec<ProcessEvent>) -> Self {
        let state = fold(&events, ProcessState::Created);
        let last_updated = events
            .iter()
            .map(ProcessEvent::timestamp)
            .max()
            .unwrap_or(UNIX_EPOCH);
        Self {
            state,
            process_id,
            events,
            last_updated,
        }
    }

    /// A new state with `event` appended.
    ///
    /// Rejects events older than the newest one already present.
    pub fn apply(&self, event: ProcessEvent) -> Result<Self, OrderingError> {
        if !self.events.is_empty() && event.timestamp() < self.last_updated {
            return Err(OrderingError::StaleAppend {
                process_id: event.process_id(),
                kind: event.kind().to_string(),
            });
        }
        let state = ProcessStateReducer::reduce(self.state, &event);
        let last_updated = event.timestamp();
        let mut events = self.events.clone();
        events.push(event);
        Ok(Self {
            state,
            process_id: self.process_id,
            events,
            last_updated,
        })
    }

    /// Checks the history is non-empty and in non-decreasing time order.
    pub fn validate(&self) -> Result<&Self, OrderingError> {
        if self.events.is_empty() {
            return Err(OrderingError::NoEvents);
        }
        let misplaced = self
            .events
            .windows(2)
            .position(|pair| pair[1].timestamp() < pair[0].timestamp());
        if let Some(position) = misplaced {
            return Err(OrderingError::OutOfOrder {
                index: position + 1,
            });
        }
        Ok(self)
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn events(&self) -> &[ProcessEvent] {
        &self.events
    }

    pub fn last_updated(&self) -> SystemTime {
        self.last_updated
    }
}
