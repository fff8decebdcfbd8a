use anyhow::{bail, Result};
use chrono::Utc;

use miniflush_core::{expiry_cutoff, AppConfig, MinifluxClient, ReaderApi};

pub async fn run(config: &AppConfig) -> Result<()> {
    println!("Config OK: {}", config.base_url());

    let rules = config.rules()?;
    let now = Utc::now();
    let mut invalid = 0;

    for rule in &rules {
        match expiry_cutoff(&rule.expiry, now) {
            Ok(cutoff) => println!(
                "  {} - entries before {}",
                rule,
                cutoff.format("%Y-%m-%d %H:%M")
            ),
            Err(e) => {
                println!("  {} - ERROR: {}", rule, e);
                invalid += 1;
            }
        }
    }

    let client = MinifluxClient::new(config)?;
    let user = client.me().await?;
    println!("\nAuthenticated as {} (id {}).", user.username, user.id);

    if invalid > 0 {
        bail!("{} of {} rules have an invalid expiry", invalid, rules.len());
    }

    Ok(())
}
