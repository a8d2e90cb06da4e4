//! DownloadSession: sole coordinator of all download-list logic.
//!
//! This is the single source of truth for:
//! - Task lifecycle reconciliation (notifications → registry)
//! - Live/durable merge at startup and persistence on lifecycle changes
//! - Command gating and per-id race serialization
//! - Aggregate statistics and render-update emission
//! - Relative-age refresh scheduling
//!
//! **Architecture rule**: no download-list logic may exist outside this
//! module's collaborators. The session is a pure state machine — every entry
//! point takes the current time as an argument and returns a declarative
//! `SessionOutcome`; the event-loop worker executes the side effects. The
//! session is an owned value with an explicit `init`/`dispose` lifecycle,
//! never a global.

use crate::core::config::clamp_threads;
use crate::core::dispatcher::{CommandDispatcher, ControlCommand};
use crate::core::events::{
    CommandResult, EngineCommand, EngineNotification, ShellAction, UserAction,
};
use crate::core::history::{HistoryRecord, HistoryStore};
use crate::core::ingest::{self, IngestOutcome};
use crate::core::metrics::AggregateStats;
use crate::core::registry::{Applied, TaskRegistry, TransitionExtra};
use crate::core::scheduler::RefreshScheduler;
use crate::core::task::TaskStatus;
use crate::core::view::{RenderOp, RenderUpdate, TaskView};
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

// ── Session Outcome ──────────────────────────────────────────────────────────

/// Result of any session operation: the side effects the caller must execute.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    /// Engine commands to issue (asynchronously; results come back as
    /// `CommandResult`).
    pub commands: Vec<EngineCommand>,
    /// Render updates to publish, in order.
    pub renders: Vec<RenderUpdate>,
    /// Local platform actions (open/reveal).
    pub shell: Vec<ShellAction>,
    /// Optional status message for the UI.
    pub status: Option<String>,
}

impl SessionOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

// ── DownloadSession ──────────────────────────────────────────────────────────

pub struct DownloadSession {
    registry: TaskRegistry,
    history: HistoryStore,
    dispatcher: CommandDispatcher,
    scheduler: RefreshScheduler,
    /// Connection count passed to start/resume commands, already clamped.
    threads: u8,
}

impl DownloadSession {
    /// Build the session and merge durable history into the live registry.
    ///
    /// Only terminal records survive `HistoryStore::open`, so everything
    /// rehydrated here is finished or failed — shown, refreshable, deletable,
    /// but never resumed. The returned outcome carries one upsert per
    /// rehydrated task.
    pub fn init(
        history: HistoryStore,
        threads: u8,
        now: SystemTime,
        mono: Instant,
    ) -> (Self, SessionOutcome) {
        let mut session = Self {
            registry: TaskRegistry::new(),
            history,
            dispatcher: CommandDispatcher::new(),
            scheduler: RefreshScheduler::new(),
            threads: clamp_threads(threads),
        };

        let records: Vec<HistoryRecord> = session.history.load_all().to_vec();
        let mut outcome = SessionOutcome::empty();
        for record in records {
            let task = record.into_task();
            session.scheduler.schedule(&task.id, task.age(now), mono);
            session.registry.restore(task);
        }
        for task in session.registry.all() {
            outcome.renders.push(RenderUpdate {
                op: RenderOp::Upsert(TaskView::project(task, now)),
                stats: AggregateStats::recompute(&session.registry),
            });
        }
        info!(
            event = "session_initialized",
            restored = session.registry.len(),
            "Download session ready"
        );
        (session, outcome)
    }

    /// Tear the session down. Live state is deliberately not flushed here:
    /// the history file already holds every lifecycle change, and records
    /// left non-terminal are pruned by the next `init`.
    pub fn dispose(self) {
        info!(
            event = "session_disposed",
            tasks = self.registry.len(),
            "Download session closed"
        );
    }

    // ── Queries (read-only) ──────────────────────────────────────────────

    pub fn stats(&self) -> AggregateStats {
        AggregateStats::recompute(&self.registry)
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Earliest pending age-refresh deadline, for the worker's sleep.
    pub fn next_refresh_deadline(&mut self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    // ── Engine notifications ─────────────────────────────────────────────

    /// Reconcile one engine notification. The main inbound entry point —
    /// every lifecycle event MUST be routed through here, in arrival order.
    pub fn handle_notification(
        &mut self,
        notification: &EngineNotification,
        now: SystemTime,
        mono: Instant,
    ) -> SessionOutcome {
        let id = notification.task_id().to_string();
        let ingested = ingest::apply(&mut self.registry, notification, now);

        let mut outcome = SessionOutcome::empty();
        match ingested {
            IngestOutcome::Ignored => return outcome,
            IngestOutcome::Created => {
                self.scheduler.schedule(&id, std::time::Duration::ZERO, mono);
                self.persist(&id);
            }
            IngestOutcome::Progressed => {}
            IngestOutcome::Transitioned(status) => {
                self.persist(&id);
                match status {
                    // The engine's cancel confirmation: an outstanding pause
                    // resolves here, not on the command ack.
                    TaskStatus::Paused => {
                        self.dispatcher.resolve(&id);
                        self.drain_queue(&id, &mut outcome);
                    }
                    // Terminal: deferred pause/resume intents can never
                    // apply again, drop them wholesale.
                    TaskStatus::Finished | TaskStatus::Failed => self.dispatcher.clear(&id),
                    TaskStatus::Downloading => {}
                }
            }
        }

        self.push_upsert(&id, now, &mut outcome);
        outcome
    }

    // ── User actions ─────────────────────────────────────────────────────

    /// Dispatch one user action through the gating rules.
    pub fn handle_action(&mut self, action: &UserAction) -> SessionOutcome {
        match action {
            UserAction::Add {
                url,
                file_name,
                dest_dir,
            } => {
                info!(event = "download_requested", url = %url, "Requesting new download");
                let mut outcome = SessionOutcome::with_status(format!("Starting {}...", url));
                outcome.commands.push(EngineCommand::StartDownload {
                    url: url.clone(),
                    threads: self.threads,
                    dest_dir: dest_dir.clone(),
                    file_name: file_name.clone(),
                });
                outcome
            }
            UserAction::Pause { id } => self.request_control(id, ControlCommand::Pause),
            UserAction::Resume { id } => self.request_control(id, ControlCommand::Resume),
            UserAction::Delete { id } => self.delete(id),
            UserAction::Open { id } => {
                let mut outcome = SessionOutcome::empty();
                if let Some(task) = self.registry.get(id) {
                    match (&task.status, &task.destination_path) {
                        (TaskStatus::Finished, Some(path)) => {
                            outcome.shell.push(ShellAction::OpenPath(path.clone()));
                        }
                        _ => {
                            debug!(event = "open_ignored", id = %id, status = ?task.status, "Open requires a finished task with a resolved path");
                        }
                    }
                }
                outcome
            }
            UserAction::Reveal { id } => {
                let mut outcome = SessionOutcome::empty();
                if let Some(path) = self.registry.get(id).and_then(|t| t.destination_path.clone())
                {
                    outcome.shell.push(ShellAction::RevealPath(path));
                } else {
                    debug!(event = "reveal_ignored", id = %id, "Reveal requires a resolved path");
                }
                outcome
            }
        }
    }

    /// Gate a pause/resume request and either issue it, queue it behind an
    /// outstanding command, or drop it as a no-op.
    fn request_control(&mut self, id: &str, cmd: ControlCommand) -> SessionOutcome {
        if !self.registry.contains(id) {
            return SessionOutcome::empty();
        }
        if self.dispatcher.is_blocked(id) {
            self.dispatcher.enqueue(id, cmd);
            return SessionOutcome::empty();
        }

        let mut outcome = SessionOutcome::empty();
        if let Some(engine_cmd) = self.gate(id, cmd) {
            self.dispatcher.mark_pending(id, cmd);
            outcome.commands.push(engine_cmd);
        }
        outcome
    }

    /// The gating rules proper. `None` means the request is a no-op against
    /// the task's current state.
    fn gate(&self, id: &str, cmd: ControlCommand) -> Option<EngineCommand> {
        let task = self.registry.get(id)?;
        match cmd {
            // Pause only applies to a task actually moving bytes; a queued
            // or stalled download has nothing to cancel.
            ControlCommand::Pause => {
                if task.status == TaskStatus::Downloading && task.current_speed > 0 {
                    Some(EngineCommand::CancelDownload { id: id.to_string() })
                } else {
                    debug!(event = "pause_ignored", id = %id, status = ?task.status, speed = task.current_speed);
                    None
                }
            }
            ControlCommand::Resume => {
                if task.status == TaskStatus::Paused {
                    Some(EngineCommand::ResumeDownload {
                        id: id.to_string(),
                        threads: self.threads,
                    })
                } else {
                    debug!(event = "resume_ignored", id = %id, status = ?task.status);
                    None
                }
            }
        }
    }

    /// Optimistic delete: remove everywhere immediately, then tell the
    /// engine best-effort. Works from any status, including mid-transfer.
    fn delete(&mut self, id: &str) -> SessionOutcome {
        if self.registry.remove(id).is_none() {
            return SessionOutcome::empty();
        }
        info!(event = "task_deleted", id = %id, "Task removed");
        self.scheduler.cancel(id);
        self.dispatcher.clear(id);
        if let Err(e) = self.history.remove(id) {
            warn!(event = "history_save_failure", id = %id, error = %e, "Failed to persist deletion");
        }

        let mut outcome = SessionOutcome::empty();
        outcome.renders.push(RenderUpdate {
            op: RenderOp::Remove(id.to_string()),
            stats: self.stats(),
        });
        // The engine-side delete is idempotent; its result is ignored.
        outcome
            .commands
            .push(EngineCommand::DeleteDownload { id: id.to_string() });
        outcome
    }

    // ── Command results ──────────────────────────────────────────────────

    /// Fold an engine command's deferred confirmation back into the state.
    pub fn handle_command_result(
        &mut self,
        result: &CommandResult,
        now: SystemTime,
    ) -> SessionOutcome {
        match result {
            CommandResult::Start { url, outcome } => match outcome {
                // Success is mute: the `started` notification carries the id
                // and drives task creation.
                Ok(()) => SessionOutcome::empty(),
                Err(e) => {
                    warn!(event = "start_rejected", url = %url, error = %e, "Engine rejected start");
                    SessionOutcome::with_status(format!("Download failed to start: {}", e))
                }
            },
            CommandResult::Cancel { id, outcome } => match outcome {
                // A cancel ack is not a pause: the task stays Downloading
                // until the `canceled` notification confirms (pessimistic).
                Ok(()) => SessionOutcome::empty(),
                Err(e) => {
                    warn!(event = "cancel_rejected", id = %id, error = %e, "Engine rejected cancel");
                    self.dispatcher.resolve(id);
                    let mut outcome = SessionOutcome::with_status("Pause failed");
                    self.drain_queue(id, &mut outcome);
                    outcome
                }
            },
            CommandResult::Resume { id, outcome } => {
                self.dispatcher.resolve(id);
                let mut out = match outcome {
                    // Pessimistic resume: Downloading commits on the ack.
                    Ok(()) => {
                        let applied = self.registry.transition(
                            id,
                            TaskStatus::Downloading,
                            TransitionExtra::default(),
                        );
                        let mut out = SessionOutcome::empty();
                        if matches!(applied, Applied::Committed) {
                            self.persist(id);
                            self.push_upsert(id, now, &mut out);
                        }
                        out
                    }
                    Err(e) => {
                        warn!(event = "resume_rejected", id = %id, error = %e, "Engine rejected resume");
                        SessionOutcome::with_status("Resume failed")
                    }
                };
                self.drain_queue(id, &mut out);
                out
            }
            CommandResult::Delete { id, outcome } => {
                if let Err(e) = outcome {
                    // Already gone on our side; the engine not knowing the id
                    // is the expected case, not a failure.
                    debug!(event = "engine_delete_noop", id = %id, error = %e);
                }
                SessionOutcome::empty()
            }
        }
    }

    // ── Age refreshes ────────────────────────────────────────────────────

    /// Re-render every task whose relative-age label just crossed a bucket
    /// boundary, and schedule each one's next crossing.
    pub fn handle_refresh_due(&mut self, now: SystemTime, mono: Instant) -> SessionOutcome {
        let mut outcome = SessionOutcome::empty();
        for id in self.scheduler.pop_due(mono) {
            let Some(task) = self.registry.get(&id) else {
                continue;
            };
            self.scheduler.schedule(&id, task.age(now), mono);
            self.push_upsert(&id, now, &mut outcome);
        }
        outcome
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Re-evaluate deferred commands for an id once its outstanding command
    /// resolved. The first one still valid against the current state is
    /// issued; stale intents are dropped.
    fn drain_queue(&mut self, id: &str, outcome: &mut SessionOutcome) {
        while let Some(cmd) = self.dispatcher.next_queued(id) {
            if let Some(engine_cmd) = self.gate(id, cmd) {
                self.dispatcher.mark_pending(id, cmd);
                outcome.commands.push(engine_cmd);
                break;
            }
            debug!(event = "queued_command_dropped", id = %id, cmd = ?cmd, "Deferred command no longer applies");
        }
    }

    /// Persist the task's durable projection. Non-fatal by contract.
    fn persist(&mut self, id: &str) {
        let Some(task) = self.registry.get(id) else {
            return;
        };
        let record = HistoryRecord::from_task(task);
        if let Err(e) = self.history.upsert(record) {
            warn!(event = "history_save_failure", id = %id, error = %e, "Failed to persist task record");
        }
    }

    fn push_upsert(&self, id: &str, now: SystemTime, outcome: &mut SessionOutcome) {
        if let Some(task) = self.registry.get(id) {
            outcome.renders.push(RenderUpdate {
                op: RenderOp::Upsert(TaskView::project(task, now)),
                stats: self.stats(),
            });
        }
    }
}
