use anyhow::{bail, Result};

use miniflush_core::{find_and_mark_expired_entries, AppConfig, MinifluxClient, SweepOptions};

pub async fn run(config: &AppConfig, dry_run: bool) -> Result<()> {
    let client = MinifluxClient::new(config)?;

    let report = find_and_mark_expired_entries(&client, config, SweepOptions { dry_run }).await?;

    for outcome in &report.outcomes {
        match &outcome.error {
            Some(err) => println!("  {} - FAILED: {}", outcome.rule, err),
            None if report.dry_run => {
                println!("  {} - {} expired entries", outcome.rule, outcome.matched)
            }
            None => println!("  {} - marked {} as read", outcome.rule, outcome.marked),
        }
    }

    if report.dry_run {
        println!("\nDry run complete. {} entries would be marked as read.", report.total_matched());
    } else {
        println!("\nSweep complete. {} entries marked as read.", report.total_marked());
    }

    if !report.is_success() {
        bail!("{} of {} rules failed", report.failures(), report.outcomes.len());
    }

    Ok(())
}
