//! Outstanding asynchronous work per scene
//!
//! Hooks start processes (a texture still loading, a fade in progress) while
//! a pass runs. The count a caller sees between passes is a snapshot taken
//! when the last pass ended, so an idle callback deciding whether to keep
//! rendering always reads a stable number. Finishing a process outside a
//! pass is queued and applied when the next pass begins.
//!
//! Ages are measured on the scheduler clock the scene's render loop runs on,
//! sampled once at the start of each pass.

use std::time::Duration;

use crate::core::SceneError;
use crate::foundation::collections::{ProcessId, SlotMap};

/// A tracked piece of asynchronous work
#[derive(Debug, Clone)]
pub struct Process {
    /// What the process is doing
    pub description: String,
    /// Pass number the process was started in
    pub started_pass: u64,
    /// Scheduler time at the start of that pass
    pub started_at: Duration,
}

impl Process {
    /// Age of the process at scheduler time `now`
    pub const fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }
}

/// Process bookkeeping for one scene
#[derive(Debug, Default)]
pub struct ProcessTable {
    processes: SlotMap<ProcessId, Process>,
    pending_finish: Vec<ProcessId>,
    in_pass: bool,
    pass: u64,
    clock: Duration,
    snapshot: usize,
}

impl ProcessTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Process count as of the end of the last pass
    pub const fn count(&self) -> usize {
        self.snapshot
    }

    /// Whether a pass is running
    pub const fn in_pass(&self) -> bool {
        self.in_pass
    }

    /// Look up a live process
    pub fn get(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(id)
    }

    /// Finish a process
    ///
    /// Inside a pass the process is removed at once; otherwise the request
    /// waits for the next pass. Returns false for unknown processes.
    pub fn finish(&mut self, id: ProcessId) -> bool {
        if !self.processes.contains_key(id) {
            return false;
        }
        if self.in_pass {
            self.processes.remove(id);
        } else if !self.pending_finish.contains(&id) {
            self.pending_finish.push(id);
        }
        true
    }

    pub(crate) fn start(&mut self, description: impl Into<String>) -> Result<ProcessId, SceneError> {
        if !self.in_pass {
            return Err(SceneError::InvalidSceneGraph(
                "processes can only be started during a pass".to_string(),
            ));
        }
        let description = description.into();
        log::debug!("Starting process '{description}'");
        Ok(self.processes.insert(Process {
            description,
            started_pass: self.pass,
            started_at: self.clock,
        }))
    }

    pub(crate) fn begin_pass(&mut self, now: Duration, timeout: Option<Duration>) {
        self.in_pass = true;
        self.pass += 1;
        self.clock = now;

        for id in self.pending_finish.drain(..) {
            self.processes.remove(id);
        }

        if let Some(timeout) = timeout {
            self.processes.retain(|_, process| {
                let age = process.age(now);
                let expired = age >= timeout;
                if expired {
                    log::warn!("Killing process '{}' after {age:?}", process.description);
                }
                !expired
            });
        }
    }

    pub(crate) fn end_pass(&mut self) {
        self.in_pass = false;
        self.snapshot = self.processes.len();
    }

    pub(crate) fn clear(&mut self) {
        self.processes.clear();
        self.pending_finish.clear();
        self.in_pass = false;
        self.snapshot = 0;
    }
}
