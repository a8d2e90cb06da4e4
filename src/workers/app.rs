//! Event-loop worker: the single owner of the download session.
//!
//! One tokio task selects over engine notifications, user actions, command
//! results, and the refresh scheduler's earliest deadline, feeding everything
//! through the session in arrival order. Because this loop is the only code
//! that ever touches the session, the core needs no locking and every
//! mutation is serialized for free.
//!
//! Side effects come back as a `SessionOutcome` and are executed here: engine
//! commands run in spawned tasks reporting into the results channel, render
//! updates go out on the render channel, and open/reveal requests shell out
//! to the platform handler.

use crate::core::config::HISTORY_FILE;
use crate::core::events::{CommandResult, EngineCommand, EngineNotification, ShellAction, UserAction};
use crate::core::history::HistoryStore;
use crate::core::session::{DownloadSession, SessionOutcome};
use crate::core::view::RenderUpdate;
use crate::utils::data_dir;
use crate::utils::sos::SignalOfStop;
use crate::workers::args::Args;
use crate::workers::bridge::TransferClient;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Run the worker until cancellation. Owns the session for its whole life.
pub async fn run(
    args: Args,
    client: Arc<dyn TransferClient>,
    mut notifications: mpsc::UnboundedReceiver<EngineNotification>,
    mut actions: mpsc::UnboundedReceiver<UserAction>,
    renders: mpsc::UnboundedSender<RenderUpdate>,
    sos: SignalOfStop,
) -> anyhow::Result<()> {
    let history = HistoryStore::open(data_dir::get().join(HISTORY_FILE));
    let (mut session, outcome) =
        DownloadSession::init(history, args.threads, SystemTime::now(), Instant::now());

    let (result_tx, mut results) = mpsc::unbounded_channel::<CommandResult>();
    let download_dir = args
        .download_dir
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());

    execute(outcome, &client, &result_tx, &renders);

    loop {
        let deadline = session.next_refresh_deadline();
        let refresh = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at.into()).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            _ = sos.wait() => break,
            Some(n) = notifications.recv() => {
                session.handle_notification(&n, SystemTime::now(), Instant::now())
            }
            Some(a) = actions.recv() => {
                let a = with_default_dest(a, download_dir.as_deref());
                session.handle_action(&a)
            }
            Some(r) = results.recv() => {
                session.handle_command_result(&r, SystemTime::now())
            }
            _ = refresh => {
                session.handle_refresh_due(SystemTime::now(), Instant::now())
            }
        };
        execute(outcome, &client, &result_tx, &renders);
    }

    session.dispose();
    Ok(())
}

/// Fill in the configured download directory when an add request leaves the
/// destination unspecified.
fn with_default_dest(action: UserAction, download_dir: Option<&str>) -> UserAction {
    match action {
        UserAction::Add {
            url,
            file_name,
            dest_dir: None,
        } => UserAction::Add {
            url,
            file_name,
            dest_dir: download_dir.map(str::to_string),
        },
        other => other,
    }
}

/// Execute a session outcome's side effects.
fn execute(
    outcome: SessionOutcome,
    client: &Arc<dyn TransferClient>,
    results: &mpsc::UnboundedSender<CommandResult>,
    renders: &mpsc::UnboundedSender<RenderUpdate>,
) {
    for cmd in outcome.commands {
        issue(client.clone(), cmd, results.clone());
    }
    for update in outcome.renders {
        // A closed render channel means the frontend is gone; the session
        // keeps reconciling regardless.
        let _ = renders.send(update);
    }
    for action in outcome.shell {
        run_shell_action(action);
    }
    if let Some(status) = outcome.status {
        info!(event = "status", message = %status);
    }
}

/// Run one engine command off the worker's control flow and feed its
/// confirmation back through the results channel.
fn issue(
    client: Arc<dyn TransferClient>,
    cmd: EngineCommand,
    results: mpsc::UnboundedSender<CommandResult>,
) {
    tokio::spawn(async move {
        let result = match cmd {
            EngineCommand::StartDownload {
                url,
                threads,
                dest_dir,
                file_name,
            } => {
                let outcome = client
                    .start_download(&url, threads, dest_dir.as_deref(), file_name.as_deref())
                    .await;
                CommandResult::Start { url, outcome }
            }
            EngineCommand::CancelDownload { id } => {
                let outcome = client.cancel_download(&id).await;
                CommandResult::Cancel { id, outcome }
            }
            EngineCommand::ResumeDownload { id, threads } => {
                let outcome = client.resume_download(&id, threads).await;
                CommandResult::Resume { id, outcome }
            }
            EngineCommand::DeleteDownload { id } => {
                let outcome = client.delete_download(&id).await;
                CommandResult::Delete { id, outcome }
            }
        };
        let _ = results.send(result);
    });
}

/// Hand a path to the platform opener. Detached; failures are logged only.
fn run_shell_action(action: ShellAction) {
    #[cfg(target_os = "macos")]
    const OPENER: &str = "open";
    #[cfg(target_os = "windows")]
    const OPENER: &str = "explorer";
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    const OPENER: &str = "xdg-open";

    let path = match action {
        ShellAction::OpenPath(path) => path,
        // Revealing a file means opening its directory.
        ShellAction::RevealPath(path) => match path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => path,
        },
    };

    if let Err(e) = std::process::Command::new(OPENER).arg(&path).spawn() {
        warn!(event = "open_failure", path = %path.display(), error = %e, "Failed to launch platform opener");
    }
}
