use anyhow::Result;

use miniflush_core::{AppConfig, MinifluxClient, ReaderApi};

pub async fn run(config: &AppConfig) -> Result<()> {
    let client = MinifluxClient::new(config)?;
    let categories = client.list_categories().await?;

    if categories.is_empty() {
        println!("No categories on the server.");
        return Ok(());
    }

    println!("Categories ({}):\n", categories.len());

    for category in &categories {
        println!("  {:>6}  {}", category.id, category.title);
    }

    Ok(())
}
