use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// What happened to a process.
///
/// Kinds the state fold doesn't know about are kept verbatim in
/// [`ProcessEventKind::Other`] so a log written by a newer version still
/// loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessEventKind {
    Started,
    Stopping,
    Stopped,
    Terminated,
    Signaled,
    Resized,
    Other(String),
}

impl ProcessEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessEventKind::Started => "started",
            ProcessEventKind::Stopping => "stopping",
            ProcessEventKind::Stopped => "stopped",
            ProcessEventKind::Terminated => "terminated",
            ProcessEventKind::Signaled => "signaled",
            ProcessEventKind::Resized => "resized",
            ProcessEventKind::Other(kind) => kind.as_str(),
        }
    }
}

impl From<&str> for ProcessEventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "started" => ProcessEventKind::Started,
            "stopping" => ProcessEventKind::Stopping,
            "stopped" => ProcessEventKind::Stopped,
            "terminated" => ProcessEventKind::Terminated,
            "signaled" => ProcessEventKind::Signaled,
            "resized" => ProcessEventKind::Resized,
            other => ProcessEventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for ProcessEventKind {
    fn from(kind: String) -> Self {
        ProcessEventKind::from(kind.as_str())
    }
}

impl From<ProcessEventKind> for String {
    fn from(kind: ProcessEventKind) -> Self {
        match kind {
            ProcessEventKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProcessEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form event details.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// One immutable entry in a process' history.
///
/// Field order is the serialized order: kind, timestamp, payload,
/// process id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEvent {
    kind: ProcessEventKind,
    timestamp: SystemTime,
    #[serde(default)]
    payload: Payload,
    process_id: u32,
}

impl ProcessEvent {
    /// An event stamped with the current wall-clock time.
    pub fn new(kind: ProcessEventKind, process_id: u32) -> Self {
        Self::at(kind, process_id, SystemTime::now())
    }

    pub fn at(kind: ProcessEventKind, process_id: u32, timestamp: SystemTime) -> Self {
        Self {
            kind,
            timestamp,
            payload: Payload::new(),
            process_id,
        }
    }

    pub fn with_payload(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> &ProcessEventKind {
        &self.kind
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }
}

/// Lifecycle state derived from a process' events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    #[default]
    Created,
    Running,
    Stopped,
    Terminated,
}
