//! Service layer: ingestion, topic matching and transcription.
//!
//! Services sit between the crawler and the knowledge store and are shared
//! by every CLI command.

pub mod ingest;
pub mod topic;
pub mod transcription;

pub use ingest::{IngestConfig, IngestEvent, IngestReport, IngestionCoordinator};
pub use topic::TopicMatcher;
pub use transcription::{GeminiTranscriber, Transcriber, TranscriptionError};
