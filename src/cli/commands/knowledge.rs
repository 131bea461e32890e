//! Knowledge base search and statistics commands.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Settings;
use crate::knowledge::{format_search_results, KnowledgeStore};

/// Print the best chunks for `query`.
pub async fn cmd_search(settings: &Settings, query: &str, limit: usize) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let hits = store.search(query, limit).await?;

    if hits.is_empty() {
        println!("{} No results for {:?}", style("!").yellow(), query);
        return Ok(());
    }

    println!(
        "{} {} result{} for {:?}\n",
        style("✓").green(),
        hits.len(),
        if hits.len() == 1 { "" } else { "s" },
        query
    );
    println!("{}", format_search_results(&hits));
    Ok(())
}

/// Print document and chunk counts.
pub async fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let stats = store.stats().await?;

    println!("{}", style("Knowledge base").bold());
    println!("  Database:  {}", settings.database_path().display());
    println!("  Documents: {}", stats.documents);
    println!("  Chunks:    {}", stats.chunks);
    Ok(())
}
