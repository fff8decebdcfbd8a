use anyhow::Result;
use chrono::Utc;

use miniflush_core::expiry_cutoff;

pub fn run(expr: &str) -> Result<()> {
    let now = Utc::now();
    let cutoff = expiry_cutoff(expr, now)?;

    println!("{}", cutoff.timestamp());
    println!(
        "{} before now: {} ({} seconds)",
        expr,
        cutoff.format("%Y-%m-%d %H:%M:%S UTC"),
        (now - cutoff).num_seconds()
    );

    Ok(())
}
