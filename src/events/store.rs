//! Append-only process event log.
//!
//! Ordering is enforced when an event is appended: an event older than the
//! last one recorded for the same process id is rejected. The log is never
//! edited or truncated, so state for a process stays queryable after the
//! process itself is gone.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::time::SystemTime;
use thiserror::Error;

use super::state::{OrderingError, ProcessStateData};
use super::types::ProcessEvent;

/// Errors reading or writing a persisted event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Event log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed event on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Ordering(#[from] OrderingError),
}

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<ProcessEvent>,
    /// Newest timestamp seen per process id.
    latest: HashMap<u32, SystemTime>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event`, rejecting it if it predates the last event for the
    /// same process.
    pub fn append(&mut self, event: ProcessEvent) -> Result<(), OrderingError> {
        let pid = event.process_id();
        if let Some(latest) = self.latest.get(&pid) {
            if event.timestamp() < *latest {
                return Err(OrderingError::StaleAppend {
                    process_id: pid,
                    kind: event.kind().to_string(),
                });
            }
        }
        self.latest.insert(pid, event.timestamp());
        self.events.push(event);
        Ok(())
    }

    /// A timestamp that can be appended for `pid` right now.
    ///
    /// Wall-clock time can step backwards; this never returns anything
    /// older than the newest event already recorded for `pid`.
    pub fn next_timestamp(&self, pid: u32) -> SystemTime {
        let now = SystemTime::now();
        match self.latest.get(&pid) {
            Some(latest) if *latest > now => *latest,
            _ => now,
        }
    }

    /// All events in append order.
    pub fn events(&self) -> &[ProcessEvent] {
        &self.events
    }

    pub fn events_for(&self, pid: u32) -> Vec<ProcessEvent> {
        self.events
            .iter()
            .filter(|event| event.process_id() == pid)
            .cloned()
            .collect()
    }

    /// Folded state for `pid`, or `None` if nothing was recorded for it.
    pub fn state_for(&self, pid: u32) -> Option<ProcessStateData> {
        let events = self.events_for(pid);
        if events.is_empty() {
            return None;
        }
        Some(ProcessStateData::from_events(pid, events))
    }

    /// Process ids in the order they first appeared.
    pub fn process_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for event in &self.events {
            if !ids.contains(&event.process_id()) {
                ids.push(event.process_id());
            }
        }
        ids
    }

    /// Process id of the most recently appended event.
    pub fn latest_process_id(&self) -> Option<u32> {
        self.events.last().map(ProcessEvent::process_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Write one JSON object per line, ordered by timestamp.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> Result<(), EventLogError> {
        let mut ordered: Vec<&ProcessEvent> = self.events.iter().collect();
        ordered.sort_by_key(|event| event.timestamp());
        for event in ordered {
            let line = serde_json::to_string(event).map_err(EventLogError::Serialize)?;
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Rebuild a store from [`EventStore::write_json_lines`] output.
    ///
    /// Blank lines are skipped. Ordering is checked exactly as
    /// [`EventStore::append`] would.
    pub fn read_json_lines<R: BufRead>(input: R) -> Result<Self, EventLogError> {
        let mut store = Self::new();
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: ProcessEvent =
                serde_json::from_str(&line).map_err(|source| EventLogError::Malformed {
                    line: index + 1,
                    source,
                })?;
            store.append(event)?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ProcessEventKind, ProcessState};
    use std::time::{Duration, UNIX_EPOCH};

    fn event(kind: ProcessEventKind, pid: u32, secs: u64) -> ProcessEvent {
        ProcessEvent::at(kind, pid, UNIX_EPOCH + Duration::from_secs(secs))
    }

    #[test]
    fn rejects_older_event_for_same_process() {
        let mut store = EventStore::new();
        store.append(event(ProcessEventKind::Started, 1, 10)).unwrap();

        let err = store
            .append(event(ProcessEventKind::Stopped, 1, 5))
            .unwrap_err();
        assert!(matches!(err, OrderingError::StaleAppend { process_id: 1, .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ordering_is_per_process() {
        let mut store = EventStore::new();
        store.append(event(ProcessEventKind::Started, 1, 10)).unwrap();
        store.append(event(ProcessEventKind::Started, 2, 5)).unwrap();
        assert_eq!(store.process_ids(), vec![1, 2]);
        assert_eq!(store.latest_process_id(), Some(2));
    }

    #[test]
    fn state_survives_in_the_log() {
        let mut store = EventStore::new();
        store.append(event(ProcessEventKind::Started, 7, 1)).unwrap();
        store.append(event(ProcessEventKind::Stopped, 7, 2)).unwrap();
        store.append(event(ProcessEventKind::Terminated, 7, 3)).unwrap();

        let state = store.state_for(7).expect("recorded");
        assert_eq!(state.state(), ProcessState::Terminated);
        assert!(state.validate().is_ok());
        assert!(store.state_for(8).is_none());
    }

    #[test]
    fn next_timestamp_never_goes_backwards() {
        let mut store = EventStore::new();
        let future = SystemTime::now() + Duration::from_secs(3600);
        store
            .append(ProcessEvent::at(ProcessEventKind::Started, 3, future))
            .unwrap();
        assert_eq!(store.next_timestamp(3), future);
        assert!(store.next_timestamp(4) < future);
    }

    #[test]
    fn json_lines_reload() {
        let mut store = EventStore::new();
        store
            .append(event(ProcessEventKind::Started, 1, 1).with_payload("command", "sh"))
            .unwrap();
        store.append(event(ProcessEventKind::Terminated, 1, 2)).unwrap();

        let mut buf = Vec::new();
        store.write_json_lines(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);

        let loaded = EventStore::read_json_lines(text.as_bytes()).unwrap();
        assert_eq!(loaded.events(), store.events());
    }

    #[test]
    fn reload_reports_bad_line_number() {
        let input = "\n{not json}\n";
        let err = EventStore::read_json_lines(input.as_bytes()).unwrap_err();
        assert!(matches!(err, EventLogError::Malformed { line: 2, .. }));
    }
}
