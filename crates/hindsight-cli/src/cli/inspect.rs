//! Offline queries against the saved snapshot: stats, window, chain.

use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use hindsight_core::repository::snapshot::SnapshotStore;
use hindsight_core::store::{ConversationRecord, ReplyGraph};
use hindsight_types::snapshot::RootSnapshot;

use crate::state::AppState;

/// Print statistics of the snapshot file.
///
/// Unlike startup, an unreadable file is reported as an error here.
pub async fn inspect(state: &AppState, json: bool) -> Result<()> {
    let path = state.backend.path().display().to_string();
    let snapshot = state
        .backend
        .load()
        .await
        .with_context(|| format!("failed to read snapshot {path}"))?;

    let Some(snapshot) = snapshot else {
        if json {
            println!("{}", serde_json::json!({ "path": path, "exists": false }));
        } else {
            println!();
            println!("  No snapshot at {}", style(&path).cyan());
            println!();
        }
        return Ok(());
    };

    let stats = snapshot.stats();
    if json {
        let agents: Vec<_> = snapshot
            .agents
            .iter()
            .map(|(agent_id, agent)| {
                serde_json::json!({
                    "agent_id": agent_id,
                    "conversations": agent.conversations.len(),
                    "contacts": agent.contacts.len(),
                })
            })
            .collect();
        let report = serde_json::json!({
            "path": path,
            "exists": true,
            "stats": stats,
            "agents": agents,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  {} Snapshot {}", style("◆").bold(), style(&path).cyan());
    println!();
    println!("  {}", style("── Store ──").dim());
    println!("  Agents:           {}", style(stats.agents).bold());
    println!("  Conversations:    {}", stats.conversations);
    println!("  Shared queues:    {}", stats.shared_queues);
    println!("  Exclusive queues: {}", stats.exclusive_queues);
    println!("  Lines:            {}", stats.lines);
    println!("  Reply links:      {}", stats.reply_links);
    println!("  Contacts:         {}", stats.contacts);
    println!();

    if !snapshot.agents.is_empty() {
        println!("{}", agent_table(&snapshot));
        println!();
    }
    Ok(())
}

fn agent_table(snapshot: &RootSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("AGENT").fg(Color::White),
            Cell::new("CONVERSATIONS").fg(Color::White),
            Cell::new("SHARED").fg(Color::White),
            Cell::new("REPLY LINKS").fg(Color::White),
            Cell::new("CONTACTS").fg(Color::White),
        ]);

    for (agent_id, agent) in &snapshot.agents {
        let shared = agent
            .conversations
            .values()
            .filter(|c| c.exclusive_queue.is_none())
            .count();
        let links: usize = agent
            .conversations
            .values()
            .map(|c| c.reply_graph.len())
            .sum();
        table.add_row(vec![
            Cell::new(agent_id).fg(Color::Cyan),
            Cell::new(agent.conversations.len()),
            Cell::new(shared),
            Cell::new(links),
            Cell::new(agent.contacts.len()),
        ]);
    }
    table
}

fn find_record(
    state: &AppState,
    agent_id: &str,
    conversation_id: i64,
) -> Option<Arc<ConversationRecord>> {
    state
        .store
        .agent(agent_id)
        .and_then(|directory| directory.conversation(conversation_id))
}

fn print_lines(title: &str, lines: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(lines)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(format!("── {title} ──")).dim());
    if lines.is_empty() {
        println!("  {}", style("(empty)").dim());
    }
    for line in lines {
        println!("  {line}");
    }
    println!();
    Ok(())
}

/// Print the most recent lines of one conversation.
pub fn window(
    state: &AppState,
    agent_id: &str,
    conversation_id: i64,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(state.limits().window);
    let lines = find_record(state, agent_id, conversation_id)
        .map(|record| record.window(limit))
        .unwrap_or_default();
    print_lines("Recent messages", &lines, json)
}

/// Print the reply chain ending in `line`.
///
/// An unknown conversation still yields the one- or two-line chain built from
/// the arguments.
pub fn chain(
    state: &AppState,
    agent_id: &str,
    conversation_id: i64,
    line: &str,
    prev_line: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(state.limits().chain);
    let lines = match find_record(state, agent_id, conversation_id) {
        Some(record) => record.chain(line, prev_line, limit),
        None => ReplyGraph::new().chain(line, prev_line, limit),
    };
    print_lines("Reply chain", &lines, json)
}
