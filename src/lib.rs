//! harvester - authenticated portal crawler and knowledge-base ingestion.
//!
//! A browser session logs in to a single-page portal, a breadth-first
//! crawler walks it within depth and page bounds, and the ingestion
//! coordinator indexes page text and media transcripts into a knowledge
//! store.

pub mod cli;
pub mod config;
pub mod knowledge;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod utils;
