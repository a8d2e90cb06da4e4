//! Per-id serialization of in-flight pause/resume commands.
//!
//! Pause and resume are pessimistic: the registry only moves once the engine
//! confirms, so between issue and confirmation a task has an outstanding
//! command whose outcome is unknown. At most one such command may be in
//! flight per id. Anything else the user requests for that id in the
//! meantime is queued FIFO and re-evaluated against the task's then-current
//! state once the outstanding command resolves — by then the original intent
//! may have become a no-op, and it must be dropped rather than replayed
//! blindly.
//!
//! Delete is exempt: it is optimistic and never waits, so it bypasses this
//! gate entirely (and clears it).

use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// A user command whose engine confirmation is awaited before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
}

#[derive(Debug, Default)]
pub struct CommandDispatcher {
    /// The one outstanding command per id, if any.
    pending: HashMap<String, ControlCommand>,
    /// Commands deferred while `pending` holds their id.
    queued: HashMap<String, VecDeque<ControlCommand>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is a confirmation still outstanding for this id?
    pub fn is_blocked(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending(&self, id: &str) -> Option<ControlCommand> {
        self.pending.get(id).copied()
    }

    /// Record the command just issued to the engine. Callers gate-check
    /// first; only actually-issued commands occupy the slot.
    pub fn mark_pending(&mut self, id: &str, cmd: ControlCommand) {
        debug_assert!(!self.pending.contains_key(id));
        self.pending.insert(id.to_string(), cmd);
    }

    /// Defer a command that arrived while another is outstanding.
    pub fn enqueue(&mut self, id: &str, cmd: ControlCommand) {
        debug!(event = "command_queued", id = %id, cmd = ?cmd, "Deferred behind an outstanding command");
        self.queued.entry(id.to_string()).or_default().push_back(cmd);
    }

    /// The outstanding command resolved (ack, error, or the confirming
    /// notification arrived). Frees the slot; drain the queue afterwards
    /// with `next_queued`.
    pub fn resolve(&mut self, id: &str) -> Option<ControlCommand> {
        self.pending.remove(id)
    }

    /// Pop the next deferred command for re-evaluation. The caller issues it
    /// (and calls `mark_pending`) only if it still passes gating; otherwise
    /// it keeps popping, dropping stale intents on the floor.
    pub fn next_queued(&mut self, id: &str) -> Option<ControlCommand> {
        let queue = self.queued.get_mut(id)?;
        let cmd = queue.pop_front();
        if queue.is_empty() {
            self.queued.remove(id);
        }
        cmd
    }

    /// Forget everything about an id. Used on deletion and on terminal
    /// transitions, where deferred pause/resume intents can never apply.
    pub fn clear(&mut self, id: &str) {
        self.pending.remove(id);
        self.queued.remove(id);
    }
}
