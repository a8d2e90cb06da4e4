//! Messages crossing the core's boundaries.
//!
//! Three directions exist:
//! - `EngineNotification` — inbound lifecycle stream from the transfer engine.
//! - `EngineCommand` / `CommandResult` — outbound requests to the engine and
//!   their deferred confirmations, fed back into the same control flow.
//! - `UserAction` — operations initiated by the presentation layer.
//!
//! All of these serialize as tagged JSON objects; the engine bridge speaks
//! them verbatim on its line protocol.

use serde::{Deserialize, Serialize};

// ── Inbound: engine → core ───────────────────────────────────────────────────

/// Lifecycle notification from the transfer engine.
///
/// Ordering contract: notifications for one id arrive in non-decreasing
/// causal order, but may be delayed arbitrarily relative to other ids, and
/// duplicates are possible. The ingestor performs no buffering — the
/// registry's no-op policy for unknown/terminal ids absorbs all races.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineNotification {
    Started {
        id: String,
        url: String,
        file_name: String,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        dest_dir: Option<String>,
    },
    Progress {
        id: String,
        received: u64,
        /// Zero when the size is still unknown to the engine.
        total: u64,
        speed: u64,
    },
    Completed {
        id: String,
        path: String,
    },
    Failed {
        id: String,
        error: String,
    },
    Canceled {
        id: String,
    },
}

impl EngineNotification {
    pub fn task_id(&self) -> &str {
        match self {
            EngineNotification::Started { id, .. }
            | EngineNotification::Progress { id, .. }
            | EngineNotification::Completed { id, .. }
            | EngineNotification::Failed { id, .. }
            | EngineNotification::Canceled { id } => id,
        }
    }
}

// ── Outbound: core → engine ──────────────────────────────────────────────────

/// Request issued to the transfer engine. The core never waits inline on
/// these — the shell executes them and reports back via `CommandResult`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum EngineCommand {
    StartDownload {
        url: String,
        threads: u8,
        #[serde(default)]
        dest_dir: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
    },
    CancelDownload {
        id: String,
    },
    ResumeDownload {
        id: String,
        threads: u8,
    },
    DeleteDownload {
        id: String,
    },
}

/// Deferred confirmation for an issued command, resumed on the core's own
/// control flow. `Err` carries the engine's failure message.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Start {
        url: String,
        outcome: Result<(), String>,
    },
    Cancel {
        id: String,
        outcome: Result<(), String>,
    },
    Resume {
        id: String,
        outcome: Result<(), String>,
    },
    Delete {
        id: String,
        outcome: Result<(), String>,
    },
}

// ── User actions: presentation → core ────────────────────────────────────────

/// User-initiated operation on the download list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserAction {
    Add {
        url: String,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        dest_dir: Option<String>,
    },
    Pause {
        id: String,
    },
    Resume {
        id: String,
    },
    Delete {
        id: String,
    },
    Open {
        id: String,
    },
    Reveal {
        id: String,
    },
}

// ── Shell side-effects ───────────────────────────────────────────────────────

/// Local platform actions the core instructs the shell to run. The core never
/// touches the filesystem or spawns processes itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    /// Open the finished file with the platform handler.
    OpenPath(std::path::PathBuf),
    /// Reveal the file's directory in the platform file manager.
    RevealPath(std::path::PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_lines_deserialize() {
        let n: EngineNotification = serde_json::from_str(
            r#"{"type":"started","id":"dl-1","url":"https://x/y.bin","file_name":"y.bin","total":1000}"#,
        )
        .unwrap();
        assert!(matches!(n, EngineNotification::Started { .. }));
        assert_eq!(n.task_id(), "dl-1");

        let n: EngineNotification = serde_json::from_str(
            r#"{"type":"progress","id":"dl-1","received":500,"total":1000,"speed":50}"#,
        )
        .unwrap();
        assert!(matches!(n, EngineNotification::Progress { .. }));
    }

    #[test]
    fn started_tolerates_missing_optionals() {
        let n: EngineNotification = serde_json::from_str(
            r#"{"type":"started","id":"dl-2","url":"https://x","file_name":"x"}"#,
        )
        .unwrap();
        match n {
            EngineNotification::Started { total, dest_dir, .. } => {
                assert_eq!(total, None);
                assert_eq!(dest_dir, None);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn command_lines_serialize_with_cmd_tag() {
        let line = serde_json::to_string(&EngineCommand::CancelDownload {
            id: "dl-1".into(),
        })
        .unwrap();
        assert_eq!(line, r#"{"cmd":"cancel_download","id":"dl-1"}"#);
    }
}
