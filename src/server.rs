//! Command loop over stdio.
//!
//! The UI layer is out of process: commands arrive as JSON lines on stdin and
//! status events leave as JSON lines on stdout. One generation run may be in
//! flight at a time; `cancel` (or SIGINT) trips a cancellation token that the
//! run observes between rows.

use crate::config::GeneratorConfig;
use crate::generator::Generator;
use crate::host::DocumentHost;
use crate::protocol::{Reporter, StatusEvent, UiCommand};
use crate::sheets::SheetsClient;
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) fn parse_command(line: &str) -> Result<UiCommand, serde_json::Error> {
    serde_json::from_str(line)
}

async fn write_events(mut rx: mpsc::UnboundedReceiver<StatusEvent>) -> Result<()> {
    let mut out = tokio::io::stdout();
    while let Some(event) = rx.recv().await {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}

/// Reads commands until stdin closes or a cancel arrives.
pub async fn run_stdio(host: Arc<dyn DocumentHost>, config: GeneratorConfig) -> Result<()> {
    let (reporter, events) = Reporter::channel();
    let writer = tokio::spawn(write_events(events));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    let rows: Arc<SheetsClient> = Arc::new(SheetsClient::new());
    reporter.ready();

    let mut running: Option<JoinHandle<()>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                reporter.error(format!("unrecognized command: {err}"));
                continue;
            }
        };

        match command {
            UiCommand::StartGeneration {
                api_key,
                spreadsheet_id,
                delete_master_templates,
            } => {
                if running.as_ref().is_some_and(|task| !task.is_finished()) {
                    reporter.warning("A generation run is already in progress");
                    continue;
                }
                let run_config = config.for_run(api_key, spreadsheet_id, delete_master_templates);
                let generator = Generator::new(
                    host.clone(),
                    rows.clone(),
                    reporter.clone(),
                    cancel.clone(),
                );
                let run_reporter = reporter.clone();
                running = Some(tokio::spawn(async move {
                    if let Err(err) = generator.run(&run_config).await {
                        run_reporter.error(format!("Failed to generate files: {err}"));
                    }
                }));
            }
            UiCommand::TestConnection {
                api_key,
                spreadsheet_id,
            } => {
                let run_config = config.for_run(api_key, spreadsheet_id, None);
                let generator = Generator::new(
                    host.clone(),
                    rows.clone(),
                    reporter.clone(),
                    cancel.clone(),
                );
                if let Err(err) = generator.test_connection(&run_config).await {
                    reporter.error(format!("Connection test failed: {err}"));
                }
            }
            UiCommand::DeleteMasterTemplates => {
                let generator = Generator::new(
                    host.clone(),
                    rows.clone(),
                    reporter.clone(),
                    cancel.clone(),
                );
                generator.delete_master_templates(&config);
            }
            UiCommand::Cancel => {
                cancel.cancel();
                break;
            }
        }
    }

    if let Some(task) = running {
        let _ = task.await;
    }
    drop(reporter);
    let _ = writer.await?;
    Ok(())
}
