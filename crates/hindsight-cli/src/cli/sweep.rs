//! `hindsight sweep`: one-off eviction of the saved snapshot.

use anyhow::{Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;

use hindsight_core::sweeper::sweep;

use crate::state::AppState;

pub async fn sweep_once(state: &AppState, json: bool) -> Result<()> {
    let ttl = state.config.sweeper.message_ttl();
    let report = sweep(&state.store, ttl, &CancellationToken::new()).await?;
    let stats = state
        .persister()
        .save()
        .await
        .context("failed to save swept snapshot")?;

    if json {
        let output = serde_json::json!({
            "units": report.units,
            "workers": report.workers,
            "evicted_lines": report.evicted_lines,
            "evicted_links": report.evicted_links,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Swept {} units with {} workers",
        style("✓").green().bold(),
        style(report.units).bold(),
        report.workers
    );
    println!("  Evicted lines:   {}", style(report.evicted_lines).yellow());
    println!("  Evicted links:   {}", style(report.evicted_links).yellow());
    println!("  Remaining lines: {}", stats.lines);
    println!("  Remaining links: {}", stats.reply_links);
    println!();
    Ok(())
}
