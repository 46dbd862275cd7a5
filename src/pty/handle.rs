use std::time::SystemTime;
use uuid::Uuid;

use crate::config::PtyConfig;

/// Identity of one spawned process.
///
/// A plain value: the OS resources it names are owned by the supervisor
/// that returned it and are released when that supervisor stops the
/// process.
#[derive(Debug, Clone, PartialEq)]
pub struct PtyHandle {
    id: Uuid,
    process_id: u32,
    raw_fd: Option<i32>,
    created_at: SystemTime,
    config: PtyConfig,
}

impl PtyHandle {
    pub fn new(process_id: u32, raw_fd: Option<i32>, config: PtyConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id,
            raw_fd,
            created_at: SystemTime::now(),
            config,
        }
    }

    /// Unique per spawn, even if the OS reuses the pid.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Master side descriptor at spawn time, if the platform exposes one.
    pub fn raw_fd(&self) -> Option<i32> {
        self.raw_fd
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn config(&self) -> &PtyConfig {
        &self.config
    }
}
