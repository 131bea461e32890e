//! Crawl and ingest command.

use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use crate::cli::helpers::{open_store, spinner, start_session, transcriber, truncate_url, CredentialArgs};
use crate::config::{Config, Settings};
use crate::models::{CrawlEvent, SkipReason};
use crate::scrapers::{Crawler, PortalFetcher};
use crate::services::{IngestEvent, IngestionCoordinator, Transcriber};

/// Crawl command arguments after CLI parsing.
#[derive(Debug, Clone)]
pub struct CrawlArgs {
    pub seed: Option<String>,
    pub depth: Option<u32>,
    pub pages: Option<usize>,
    pub topic: Option<String>,
    pub focused: bool,
    pub transcribe: bool,
}

/// Crawl the portal, then ingest pages and media.
pub async fn cmd_crawl(
    settings: &Settings,
    config: &Config,
    args: CrawlArgs,
    credentials: &CredentialArgs,
) -> anyhow::Result<()> {
    let seed = args
        .seed
        .clone()
        .or_else(|| config.portal.base_url.clone())
        .ok_or_else(|| anyhow::anyhow!("No seed URL: pass one or configure portal.base_url"))?;

    let mut crawl_config = config.crawl.clone();
    if let Some(depth) = args.depth {
        crawl_config.max_depth = depth;
    }
    if let Some(pages) = args.pages {
        crawl_config.max_pages = pages;
    }
    let crawler = Crawler::new(crawl_config.options());

    let store = open_store(settings)?;
    let mut session = start_session(settings, config).await?;

    if let Some((username, password)) = credentials.pair() {
        let pb = spinner(format!("Logging in as {}...", username))?;
        let ok = session.login(username, password).await;
        pb.finish_and_clear();
        if ok {
            println!("{} Logged in as {}", style("✓").green(), username);
        } else {
            println!(
                "{} Login failed; pages behind the login will be skipped",
                style("!").yellow()
            );
        }
    } else if !settings.session_file.exists() {
        println!(
            "{} No credentials or saved session; only public pages will be crawled",
            style("!").yellow()
        );
    }

    println!(
        "{} Crawling {} (depth {}, up to {} pages)",
        style("→").cyan(),
        seed,
        crawl_config.max_depth,
        crawl_config.max_pages.max(1)
    );

    let pb = spinner("Starting crawl...")?;
    let mut visited = 0usize;
    let report = {
        let pb = pb.clone();
        crawler
            .crawl_with_observer(&mut session, &seed, move |event| match event {
                CrawlEvent::Visiting(target) => {
                    visited += 1;
                    pb.set_message(format!(
                        "[{}] depth {} {}",
                        visited,
                        target.depth,
                        truncate_url(&target.url, 70)
                    ));
                }
                CrawlEvent::Failed(failure) => {
                    pb.println(format!(
                        "  {} {}: {}",
                        style("✗").red(),
                        failure.target.url,
                        failure.message
                    ));
                }
                CrawlEvent::Skipped(skipped) if skipped.reason == SkipReason::AuthRequired => {
                    pb.println(format!(
                        "  {} {} requires login",
                        style("!").yellow(),
                        skipped.target.url
                    ));
                }
                _ => {}
            })
            .await
    };

    let cookies = session.cookies().await;
    if let Some(url) = session.current_url().await {
        tracing::debug!("Crawl ended on {}", url);
    }
    session.close().await;
    pb.finish_and_clear();

    println!(
        "{} Visited {} pages ({} with results, {} errors)",
        style("✓").green(),
        report.visited.len(),
        report.pages.len(),
        report.errors.len()
    );

    let mut ingest_config = config.knowledge.ingest_config(args.topic.clone());
    if args.focused {
        ingest_config.learn_everything = false;
    }
    ingest_config.transcribe_media &= args.transcribe;

    let (tx, mut rx) = mpsc::channel::<IngestEvent>(64);
    let mut coordinator = IngestionCoordinator::new(store, ingest_config.clone()).with_events(tx);

    if ingest_config.transcribe_media {
        match transcriber(settings, config, &cookies)? {
            Some(t) => {
                let t: Arc<dyn Transcriber> = Arc::new(t);
                coordinator = coordinator.with_transcriber(t);
            }
            None => println!(
                "{} GEMINI_API_KEY not set; media will be listed but not transcribed",
                style("!").yellow()
            ),
        }
    }

    let pb = spinner("Indexing...")?;
    let events = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    IngestEvent::PageIndexed { source, .. } => {
                        pb.set_message(format!("Indexed {}", truncate_url(&source, 70)));
                    }
                    IngestEvent::Transcribing { url } => {
                        pb.set_message(format!("Transcribing {}", truncate_url(&url, 70)));
                    }
                    IngestEvent::MediaFailed { url, error } => {
                        pb.println(format!("  {} {}: {}", style("✗").red(), url, error));
                    }
                    _ => {}
                }
            }
        })
    };

    let summary = coordinator.run(&report).await;
    drop(coordinator);
    let _ = events.await;
    pb.finish_and_clear();

    println!();
    println!("{}", style("Summary").bold());
    for line in summary.to_string().lines() {
        println!("  {}", line);
    }

    if summary.total_errors() > 0 {
        println!(
            "{} Completed with {} errors (see log with -v)",
            style("!").yellow(),
            summary.total_errors()
        );
    } else {
        println!("{} Done", style("✓").green());
    }
    Ok(())
}
