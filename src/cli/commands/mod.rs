//! Command implementations.

pub mod crawl;
pub mod knowledge;
pub mod login;
pub mod transcribe;
