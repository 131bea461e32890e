//! Single-asset transcription command.

use std::collections::BTreeSet;
use std::sync::Arc;

use console::style;

use crate::cli::helpers::{open_store, saved_cookies, spinner, transcriber};
use crate::config::{Config, Settings};
use crate::models::MediaAsset;
use crate::services::{IngestReport, IngestionCoordinator, Transcriber};

/// Transcribe `url` with the saved session cookies, optionally indexing it.
pub async fn cmd_transcribe(
    settings: &Settings,
    config: &Config,
    url: &str,
    mime: Option<&str>,
    index: bool,
) -> anyhow::Result<()> {
    let cookies = saved_cookies(settings);
    let Some(gemini) = transcriber(settings, config, &cookies)? else {
        anyhow::bail!("GEMINI_API_KEY (or GOOGLE_API_KEY) is not set");
    };

    let asset = MediaAsset::classify(url);
    if !asset.kind.is_transcribable() {
        println!(
            "{} {} does not look like audio or video ({})",
            style("!").yellow(),
            asset.file_name(),
            asset.kind
        );
    }

    if index {
        let store = open_store(settings)?;
        let coordinator =
            IngestionCoordinator::new(store, config.knowledge.ingest_config(None))
                .with_transcriber(Arc::new(gemini) as Arc<dyn Transcriber>);

        let pb = spinner(format!("Transcribing {}...", asset.file_name()))?;
        let mut report = IngestReport::default();
        let links = BTreeSet::from([asset.url.clone()]);
        coordinator.ingest_media(&links, &mut report).await;
        pb.finish_and_clear();

        if report.media_transcribed > 0 {
            println!("{} Indexed {}", style("✓").green(), asset.document_title());
        } else if report.media_known > 0 {
            println!("{} {} is already indexed", style("!").yellow(), asset.url);
        } else {
            anyhow::bail!("Transcription of {} failed", asset.url);
        }
        return Ok(());
    }

    let mime_type = mime.map(str::to_string).unwrap_or_else(|| asset.mime_type());
    let pb = spinner(format!("Transcribing {}...", asset.file_name()))?;
    let result = gemini.transcribe(url, &mime_type).await;
    pb.finish_and_clear();

    let text = result?;
    println!("{}", text.trim());
    Ok(())
}
