//! Configuration management for harvester using the prefer crate.
//!
//! Settings start from defaults, the discovered config file overrides them,
//! and CLI flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_CHUNK_SIZE;
use crate::scrapers::crawler::{DEFAULT_PAGE_TIMEOUT_SECS, DEFAULT_POLITE_DELAY_MS};
use crate::scrapers::extract::{
    DEFAULT_CONTENT_SELECTORS, DEFAULT_MAX_CONTENT_CHARS, DEFAULT_MIN_BLOCK_CHARS,
};
use crate::scrapers::{BrowserEngineConfig, ContentExtractor, CrawlOptions, PortalConfig};
use crate::services::transcription::{DEFAULT_GEMINI_MODEL, DEFAULT_INLINE_LIMIT};
use crate::services::IngestConfig;

/// Default knowledge database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "knowledge.db";

/// Default session state filename.
pub const DEFAULT_SESSION_FILENAME: &str = "auth_state.json";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Saved cookies and local storage.
    pub session_file: PathBuf,
    /// User agent for media downloads (None = browser-like default).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("harvester");

        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            session_file: data_dir.join(DEFAULT_SESSION_FILENAME),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            user_agent: None,
            request_timeout: 300,
        }
    }

    /// Get the full path to the knowledge database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }
}

/// Crawl bounds and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_polite_delay")]
    pub polite_delay_ms: u64,
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> usize {
    50
}

fn default_page_timeout() -> u64 {
    DEFAULT_PAGE_TIMEOUT_SECS
}

fn default_polite_delay() -> u64 {
    DEFAULT_POLITE_DELAY_MS
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            page_timeout_secs: default_page_timeout(),
            polite_delay_ms: default_polite_delay(),
        }
    }
}

impl CrawlConfig {
    pub fn options(&self) -> CrawlOptions {
        CrawlOptions::new(self.max_depth, self.max_pages)
            .with_page_timeout(Duration::from_secs(self.page_timeout_secs))
            .with_polite_delay(Duration::from_millis(self.polite_delay_ms))
    }
}

/// Content extraction tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,
    #[serde(default = "default_min_block_chars")]
    pub min_block_chars: usize,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_content_selectors() -> Vec<String> {
    DEFAULT_CONTENT_SELECTORS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_block_chars() -> usize {
    DEFAULT_MIN_BLOCK_CHARS
}

fn default_max_content_chars() -> usize {
    DEFAULT_MAX_CONTENT_CHARS
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            content_selectors: default_content_selectors(),
            min_block_chars: default_min_block_chars(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl ExtractionConfig {
    pub fn content_extractor(&self) -> ContentExtractor {
        ContentExtractor::with_settings(
            &self.content_selectors,
            self.min_block_chars,
            self.max_content_chars,
        )
    }
}

/// Ingestion behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Index pages that do not match the topic.
    #[serde(default = "default_true")]
    pub learn_everything: bool,
    #[serde(default = "default_true")]
    pub transcribe_media: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            learn_everything: true,
            transcribe_media: true,
        }
    }
}

impl KnowledgeConfig {
    pub fn ingest_config(&self, topic: Option<String>) -> IngestConfig {
        IngestConfig {
            chunk_size: self.chunk_size,
            topic,
            learn_everything: self.learn_everything,
            transcribe_media: self.transcribe_media,
        }
    }
}

/// Gemini transcription settings. The API key always comes from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_inline_limit")]
    pub inline_limit_bytes: u64,
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_inline_limit() -> u64 {
    DEFAULT_INLINE_LIMIT
}

fn default_request_delay() -> u64 {
    200
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            inline_limit_bytes: default_inline_limit(),
            request_delay_ms: default_request_delay(),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Session state file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,
    /// User agent string for media downloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Download timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers harvester config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("harvester").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.session_file = settings.data_dir.join(DEFAULT_SESSION_FILENAME);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        // Portal-level session_file wins over the top-level key.
        let session_file = self
            .portal
            .session_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| self.session_file.clone());
        if let Some(session_file) = session_file {
            settings.session_file = self.resolve_path(&session_file, base_dir);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
    }

    /// Fill unset values from the environment.
    pub fn apply_env_overrides(&mut self) {
        if self.browser.remote_url.is_none() {
            self.browser.remote_url = env_value("BROWSERLESS_URL");
        }
        if self.portal.base_url.is_none() {
            self.portal.base_url = env_value("PORTAL_URL");
        }
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.trim().is_empty())
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data flag).
    pub data: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let mut config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };
    config.apply_env_overrides();

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    // --data takes precedence over the config file
    if let Some(data_dir) = options.data {
        let data_dir = config.resolve_path(&data_dir.to_string_lossy(), &base_dir);
        settings.session_file = data_dir.join(DEFAULT_SESSION_FILENAME);
        settings.data_dir = data_dir;
    }

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_sections_override_defaults() {
        let config = Config::parse(
            r#"
            data_dir = "kb"

            [portal]
            base_url = "https://portal.test"

            [crawl]
            max_depth = 1
            max_pages = 10

            [knowledge]
            learn_everything = false
            "#,
            "toml",
        )
        .unwrap();

        assert_eq!(config.portal.base_url.as_deref(), Some("https://portal.test"));
        assert_eq!(config.crawl.max_depth, 1);
        assert_eq!(config.crawl.page_timeout_secs, DEFAULT_PAGE_TIMEOUT_SECS);
        assert!(!config.knowledge.learn_everything);
        assert!(config.knowledge.transcribe_media);
        assert_eq!(config.transcription.model, DEFAULT_GEMINI_MODEL);

        let options = config.crawl.options();
        assert_eq!(options.max_pages, 10);
        assert_eq!(options.polite_delay, Duration::from_millis(DEFAULT_POLITE_DELAY_MS));
    }

    #[test]
    fn yaml_and_json_are_supported() {
        let yaml = Config::parse("crawl:\n  max_pages: 7\n", "yml").unwrap();
        assert_eq!(yaml.crawl.max_pages, 7);

        let json = Config::parse(r#"{"browser": {"headless": false}}"#, "json").unwrap();
        assert!(!json.browser.headless);

        assert!(Config::parse("not = [valid", "toml").is_err());
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let config = Config {
            data_dir: Some("data".to_string()),
            session_file: Some("/tmp/state.json".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::with_data_dir(PathBuf::from("/unused"));
        config.apply_to_settings(&mut settings, Path::new("/etc/harvester"));

        assert_eq!(settings.data_dir, PathBuf::from("/etc/harvester/data"));
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/etc/harvester/data/knowledge.db")
        );
        assert_eq!(settings.session_file, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn session_file_defaults_into_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/srv/kb"));
        assert_eq!(settings.session_file, PathBuf::from("/srv/kb/auth_state.json"));
    }

    #[tokio::test]
    async fn load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvester.json");
        std::fs::write(&path, r#"{"database": "brain.db"}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.database.as_deref(), Some("brain.db"));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));
    }
}
