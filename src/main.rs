mod core;
mod utils;
mod workers;

use crate::core::view::{RenderOp, RenderUpdate};
use crate::utils::sos::SignalOfStop;
use crate::workers::args::Args;
use crate::workers::bridge::StdioBridge;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::load();

    // Initialize the global data directory (must happen before any persistence access)
    crate::utils::data_dir::init(args.conf.as_deref());

    // Init tracing. Stdout carries the render protocol, so logs go to stderr.
    let filter = match args.verbose {
        0 => "warn,downdeck=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sos = SignalOfStop::new();

    // Ctrl+C handler
    let sos_clone = sos.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        sos_clone.cancel();
    });

    // Engine sidecar: notifications in, commands out.
    let (notif_tx, notif_rx) = mpsc::unbounded_channel();
    let bridge = StdioBridge::spawn(&args.engine, notif_tx, sos.clone())?;

    // Frontend boundary on our own stdio: user actions arrive as JSON lines
    // on stdin, render updates leave as JSON lines on stdout.
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let stdin_sos = sos.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = stdin_sos.select(lines.next_line()).await.unwrap_or(Ok(None)) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(action) => {
                    if action_tx.send(action).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(event = "action_unparsable", error = %e, line = %line, "Dropping malformed action line");
                }
            }
        }
    });

    let (render_tx, mut render_rx) = mpsc::unbounded_channel::<RenderUpdate>();
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(update) = render_rx.recv().await {
            let line = match update.op {
                RenderOp::Upsert(view) => json!({
                    "op": "upsert",
                    "task": view,
                    "stats": update.stats,
                }),
                RenderOp::Remove(id) => json!({
                    "op": "remove",
                    "id": id,
                    "stats": update.stats,
                }),
            };
            let mut buf = line.to_string();
            buf.push('\n');
            if stdout.write_all(buf.as_bytes()).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    workers::app::run(args, bridge, notif_rx, action_rx, render_tx, sos).await
}
