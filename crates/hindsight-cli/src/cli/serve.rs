//! `hindsight serve`: feed observed messages into the store.
//!
//! Reads newline-delimited JSON [`ObservedEvent`]s from stdin. Events flagged
//! as `reply` are recorded with their reply link and trigger a snapshot;
//! everything else is only appended to the conversation's queue.

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use hindsight_core::snapshotter::{Snapshotter, UpdateNotifier, update_channel};
use hindsight_core::store::RootStore;
use hindsight_core::sweeper::Sweeper;
use hindsight_types::line::ObservedMessage;

use crate::state::AppState;

/// One message as seen by one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub agent_id: String,
    pub conversation_id: i64,
    /// Public conversations share one queue across agents when configured.
    #[serde(default)]
    pub public: bool,
    pub sender: String,
    pub line: String,
    #[serde(default)]
    pub prev_line: String,
    /// The agent answered this message.
    #[serde(default)]
    pub reply: bool,
    /// Unix seconds; defaults to the time of arrival.
    #[serde(default)]
    pub at: Option<i64>,
}

impl ObservedEvent {
    fn message(&self) -> ObservedMessage {
        ObservedMessage::new(&self.sender, &self.line).replying_to(&self.prev_line)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Default, Serialize)]
struct ServeSummary {
    events: usize,
    replies: usize,
    new_conversations: usize,
    rejected: usize,
}

/// Apply one event to the store. Returns whether a new conversation record
/// was created.
fn apply_event(store: &RootStore, notifier: &UpdateNotifier, event: &ObservedEvent) -> bool {
    let (record, existed) =
        store.get_or_create_conversation(&event.agent_id, event.conversation_id, event.public);
    let message = event.message();
    let at = event.timestamp();

    if event.reply {
        record.record_at(&message, at);
        notifier.notify();
    } else {
        record.observe_at(&message, at);
    }

    tracing::debug!(
        agent_id = %event.agent_id,
        conversation_id = event.conversation_id,
        reply = event.reply,
        "event applied"
    );
    !existed
}

/// Read stdin lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(256);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            // Invalid UTF-8 only spoils its own line; other errors end the input.
            let fatal = matches!(&line, Err(e) if e.kind() != std::io::ErrorKind::InvalidData);
            if tx.blocking_send(line).is_err() || fatal {
                break;
            }
        }
    });
    rx
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Apply input lines until EOF or `shutdown`. Unreadable and malformed lines
/// are counted as rejected.
async fn pump_events(
    store: &RootStore,
    notifier: &UpdateNotifier,
    lines: &mut mpsc::Receiver<std::io::Result<String>>,
    shutdown: impl Future<Output = ()>,
) -> ServeSummary {
    tokio::pin!(shutdown);
    let mut summary = ServeSummary::default();

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            line = lines.recv() => line,
        };
        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                summary.rejected += 1;
                tracing::warn!(error = %e, "skipping unreadable input line");
                continue;
            }
            None => {
                tracing::info!("end of input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ObservedEvent>(&line) {
            Ok(event) => {
                summary.events += 1;
                summary.replies += usize::from(event.reply);
                if apply_event(store, notifier, &event) {
                    summary.new_conversations += 1;
                }
            }
            Err(e) => {
                summary.rejected += 1;
                tracing::warn!(error = %e, "skipping malformed event");
            }
        }
    }

    summary
}

/// Run the sweeper and snapshotter around [`pump_events`], then stop both and
/// wait for the final save.
async fn run_session(
    state: &AppState,
    mut lines: mpsc::Receiver<std::io::Result<String>>,
    shutdown: impl Future<Output = ()>,
) -> Result<ServeSummary> {
    let config = &state.config;
    let persister = state.persister();
    let (notifier, updates) = update_channel(config.snapshot.notify_capacity);
    let cancel = CancellationToken::new();

    let sweeper = tokio::spawn(
        Sweeper::new(
            Arc::clone(&persister),
            config.sweeper.message_ttl(),
            config.sweeper.sweep_interval(),
        )
        .run(cancel.child_token()),
    );
    let snapshotter = tokio::spawn(Snapshotter::new(persister, updates).run(cancel.child_token()));

    let summary = pump_events(&state.store, &notifier, &mut lines, shutdown).await;

    // Dropping the notifier lets the snapshotter drain; cancel covers the sweeper.
    drop(notifier);
    cancel.cancel();
    sweeper.await?;
    snapshotter.await?;
    Ok(summary)
}

pub async fn serve(state: &AppState, json: bool) -> Result<()> {
    tracing::info!(
        path = %state.config.snapshot.path.display(),
        shared_conversations = state.config.memory.shared_conversations.len(),
        "serving, reading events from stdin"
    );
    let summary = run_session(state, spawn_stdin_reader(), shutdown_signal()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  {} Hindsight stopped", style("■").bold());
    println!("  Events:            {}", style(summary.events).bold());
    println!("  Replies recorded:  {}", style(summary.replies).green());
    println!("  New conversations: {}", summary.new_conversations);
    if summary.rejected > 0 {
        println!("  Rejected lines:    {}", style(summary.rejected).yellow());
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hindsight_types::config::HindsightConfig;
    use tempfile::TempDir;

    fn event(json: &str) -> ObservedEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn minimal_event_defaults_to_private_observation() {
        let event = event(r#"{"agent_id":"luna","conversation_id":5,"sender":"ann","line":"Ann: hi"}"#);
        assert!(!event.public);
        assert!(!event.reply);
        assert!(event.prev_line.is_empty());
        assert!(event.at.is_none());
    }

    #[test]
    fn reply_event_records_link_and_notifies() {
        let store = RootStore::new([-100]);
        let (notifier, mut updates) = update_channel(1);
        let reply = event(
            r#"{"agent_id":"luna","conversation_id":-100,"public":true,"sender":"bob",
                "line":"Bob: yes","prev_line":"Luna: ready?","reply":true,"at":1700000000}"#,
        );

        assert!(apply_event(&store, &notifier, &reply));
        let record = store.agent("luna").unwrap().conversation(-100).unwrap();
        assert!(record.is_shared());
        assert_eq!(record.window(5), vec!["Bob: yes"]);
        assert_eq!(
            record.chains().predecessor("Bob: yes").as_deref(),
            Some("Luna: ready?")
        );

        assert!(updates.take_pending());
        assert!(!updates.take_pending());
    }

    #[test]
    fn observed_event_only_appends() {
        let store = RootStore::new([]);
        let (notifier, mut updates) = update_channel(1);
        let seen = event(
            r#"{"agent_id":"sol","conversation_id":9,"sender":"ann",
                "line":"Ann: lunch?","prev_line":"Sol: hungry"}"#,
        );

        assert!(apply_event(&store, &notifier, &seen));
        assert!(!apply_event(&store, &notifier, &seen));
        let record = store.agent("sol").unwrap().conversation(9).unwrap();
        assert_eq!(record.queue().len(), 2);
        assert!(record.chains().is_empty());
        assert!(!updates.take_pending());
    }

    #[tokio::test]
    async fn unreadable_line_is_rejected_and_final_save_still_runs() {
        let dir = TempDir::new().unwrap();
        let mut config = HindsightConfig::default();
        config.snapshot.path = dir.path().join("history.bin");
        let state = AppState::init(config.clone()).await;

        let (tx, rx) = mpsc::channel(8);
        for line in [
            Ok(r#"{"agent_id":"luna","conversation_id":5,"sender":"ann","line":"Ann: one"}"#.to_string()),
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "stream did not contain valid UTF-8",
            )),
            Ok("not json".to_string()),
            Ok(r#"{"agent_id":"luna","conversation_id":5,"sender":"ann","line":"Ann: two"}"#.to_string()),
        ] {
            tx.send(line).await.unwrap();
        }
        drop(tx);

        let summary = run_session(&state, rx, std::future::pending()).await.unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.new_conversations, 1);

        let restarted = AppState::init(config).await;
        let record = restarted
            .store
            .agent("luna")
            .and_then(|agent| agent.conversation(5))
            .unwrap();
        assert_eq!(record.window(10), vec!["Ann: one", "Ann: two"]);
    }

    #[tokio::test]
    async fn shutdown_signal_ends_session_with_a_save() {
        let dir = TempDir::new().unwrap();
        let mut config = HindsightConfig::default();
        config.snapshot.path = dir.path().join("history.bin");
        let state = AppState::init(config.clone()).await;

        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok(
            r#"{"agent_id":"sol","conversation_id":3,"sender":"bob","line":"Bob: hey"}"#.to_string(),
        ))
        .await
        .unwrap();
        let shutdown = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        };

        // The sender stays open, so only the shutdown future ends the session.
        let summary = run_session(&state, rx, shutdown).await.unwrap();
        drop(tx);
        assert_eq!(summary.events, 1);

        let restarted = AppState::init(config).await;
        assert_eq!(restarted.store.stats().lines, 1);
    }
}
