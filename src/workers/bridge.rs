//! Engine bridge: the asynchronous command/event boundary.
//!
//! The transfer engine runs as a sidecar process speaking JSON lines on its
//! stdio. Notifications arrive unsolicited on the child's stdout; commands go
//! out on its stdin carrying a correlation id, and resolve when the matching
//! `result` line comes back. The bridge never blocks the event-loop worker:
//! command execution is awaited by spawned tasks, and notification delivery
//! is a plain channel send.
//!
//! `TransferClient` is the seam the worker depends on; tests substitute their
//! own implementation instead of spawning a process.

use crate::core::events::{EngineCommand, EngineNotification};
use crate::utils::sos::SignalOfStop;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Ack-or-error outcome of one engine command, as the core consumes it.
pub type CommandOutcome = Result<(), String>;

/// The engine boundary. One method per command; each resolves with the
/// engine's ack or its failure message.
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn start_download(
        &self,
        url: &str,
        threads: u8,
        dest_dir: Option<&str>,
        file_name: Option<&str>,
    ) -> CommandOutcome;

    async fn cancel_download(&self, id: &str) -> CommandOutcome;

    async fn resume_download(&self, id: &str, threads: u8) -> CommandOutcome;

    async fn delete_download(&self, id: &str) -> CommandOutcome;
}

// ── Wire format ──────────────────────────────────────────────────────────────

/// Outbound command line: the command payload plus a correlation id.
#[derive(Serialize)]
struct CommandLine<'a> {
    req: &'a str,
    #[serde(flatten)]
    cmd: &'a EngineCommand,
}

/// Inbound lines are either a command result or a lifecycle notification.
/// The `result` field disambiguates; anything else must parse as a
/// notification.
#[derive(Deserialize)]
#[serde(untagged)]
enum InboundLine {
    Result {
        result: String,
        #[serde(default)]
        error: Option<String>,
    },
    Notification(EngineNotification),
}

// ── Stdio bridge ─────────────────────────────────────────────────────────────

pub struct StdioBridge {
    stdin: Mutex<ChildStdin>,
    /// Commands awaiting their `result` line, by correlation id.
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<CommandOutcome>>>>,
    // Held so the sidecar dies with us (kill_on_drop).
    _child: Child,
}

impl StdioBridge {
    /// Spawn the sidecar engine process and start routing its stdout.
    /// Notifications flow into `notifications`; results resolve their
    /// pending command.
    pub fn spawn(
        engine_cmd: &str,
        notifications: mpsc::UnboundedSender<EngineNotification>,
        sos: SignalOfStop,
    ) -> Result<Arc<Self>> {
        let mut parts = engine_cmd.split_whitespace();
        let program = parts.next().context("empty engine command")?;
        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn engine: {engine_cmd}"))?;

        let stdin = child.stdin.take().context("engine stdin unavailable")?;
        let stdout = child.stdout.take().context("engine stdout unavailable")?;

        let bridge = Arc::new(Self {
            stdin: Mutex::new(stdin),
            pending: Arc::new(Mutex::new(HashMap::new())),
            _child: child,
        });

        info!(event = "engine_spawned", cmd = %engine_cmd, "Transfer engine sidecar started");

        let pending = bridge.pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let line = tokio::select! {
                    _ = sos.wait() => break,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) => {
                        Self::route_line(&line, &notifications, &pending).await;
                    }
                    Ok(None) => {
                        error!(event = "engine_closed", "Engine stdout closed");
                        break;
                    }
                    Err(e) => {
                        error!(event = "engine_read_failure", error = %e, "Engine stdout unreadable");
                        break;
                    }
                }
            }
            // Outstanding commands can never resolve now; dropping the
            // senders fails them on the receiving side.
            pending.lock().await.clear();
        });

        Ok(bridge)
    }

    async fn route_line(
        line: &str,
        notifications: &mpsc::UnboundedSender<EngineNotification>,
        pending: &Mutex<HashMap<String, oneshot::Sender<CommandOutcome>>>,
    ) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<InboundLine>(line) {
            Ok(InboundLine::Result { result, error }) => {
                let Some(tx) = pending.lock().await.remove(&result) else {
                    debug!(event = "unmatched_result", req = %result, "Result for unknown correlation id");
                    return;
                };
                let outcome = match error {
                    None => Ok(()),
                    Some(e) => Err(e),
                };
                let _ = tx.send(outcome);
            }
            Ok(InboundLine::Notification(n)) => {
                let _ = notifications.send(n);
            }
            Err(e) => {
                warn!(event = "engine_line_unparsable", error = %e, line = %line, "Dropping malformed engine line");
            }
        }
    }

    /// Write one command line and await its `result`.
    async fn send(&self, cmd: EngineCommand) -> CommandOutcome {
        let req = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(req.clone(), tx);

        let line = match serde_json::to_string(&CommandLine { req: &req, cmd: &cmd }) {
            Ok(line) => line,
            Err(e) => {
                self.pending.lock().await.remove(&req);
                return Err(format!("command serialization failed: {e}"));
            }
        };

        {
            let mut stdin = self.stdin.lock().await;
            let write = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            };
            if let Err(e) = write.await {
                self.pending.lock().await.remove(&req);
                return Err(format!("engine unreachable: {e}"));
            }
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err("engine bridge closed".to_string()),
        }
    }
}

#[async_trait]
impl TransferClient for StdioBridge {
    async fn start_download(
        &self,
        url: &str,
        threads: u8,
        dest_dir: Option<&str>,
        file_name: Option<&str>,
    ) -> CommandOutcome {
        self.send(EngineCommand::StartDownload {
            url: url.to_string(),
            threads,
            dest_dir: dest_dir.map(str::to_string),
            file_name: file_name.map(str::to_string),
        })
        .await
    }

    async fn cancel_download(&self, id: &str) -> CommandOutcome {
        self.send(EngineCommand::CancelDownload { id: id.to_string() })
            .await
    }

    async fn resume_download(&self, id: &str, threads: u8) -> CommandOutcome {
        self.send(EngineCommand::ResumeDownload {
            id: id.to_string(),
            threads,
        })
        .await
    }

    async fn delete_download(&self, id: &str) -> CommandOutcome {
        self.send(EngineCommand::DeleteDownload { id: id.to_string() })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines_carry_correlation_id_and_payload() {
        let cmd = EngineCommand::ResumeDownload {
            id: "dl-1".into(),
            threads: 4,
        };
        let line = serde_json::to_string(&CommandLine {
            req: "req-1",
            cmd: &cmd,
        })
        .unwrap();
        assert_eq!(
            line,
            r#"{"req":"req-1","cmd":"resume_download","id":"dl-1","threads":4}"#
        );
    }

    #[test]
    fn inbound_lines_disambiguate_results_from_notifications() {
        match serde_json::from_str::<InboundLine>(r#"{"result":"req-1"}"#).unwrap() {
            InboundLine::Result { result, error } => {
                assert_eq!(result, "req-1");
                assert!(error.is_none());
            }
            _ => panic!("expected a result line"),
        }

        match serde_json::from_str::<InboundLine>(r#"{"result":"req-2","error":"no such id"}"#)
            .unwrap()
        {
            InboundLine::Result { error, .. } => assert_eq!(error.as_deref(), Some("no such id")),
            _ => panic!("expected a result line"),
        }

        match serde_json::from_str::<InboundLine>(
            r#"{"type":"progress","id":"dl-1","received":10,"total":100,"speed":5}"#,
        )
        .unwrap()
        {
            InboundLine::Notification(EngineNotification::Progress { id, .. }) => {
                assert_eq!(id, "dl-1");
            }
            _ => panic!("expected a notification line"),
        }
    }
}
