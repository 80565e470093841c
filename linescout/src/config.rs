use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};

/// Engine settings shared by every search a coordinator runs.
///
/// Per-invocation inputs (term, root, traversal flags) live in
/// [`SearchOptions`](crate::options::SearchOptions); this type holds the knobs
/// that stay fixed across searches.
///
/// # Configuration Locations
///
/// The configuration is loaded from these locations, later ones overriding
/// earlier ones:
/// 1. Global `$CONFIG_DIR/linescout/config.yaml`
/// 2. Local `.linescout.yaml` in the current directory
/// 3. Custom config file passed to [`SearchConfig::load_from`]
///
/// # Configuration Format
///
/// ```yaml
/// # Maximum number of files scanned at once (default: CPU cores)
/// concurrency: 8
///
/// # Dispatches between cooperative yields
/// yield_interval: 100
///
/// # Per-file scan and per-file git lookup limits, in milliseconds
/// scan_timeout_ms: 30000
/// author_timeout_ms: 5000
///
/// # Look up the last commit author of every matching file
/// resolve_authors: true
///
/// # Files to skip (glob syntax, matched against the full path)
/// ignore_patterns:
///   - "**/node_modules/**"
///
/// # Only search these extensions
/// file_extensions:
///   - "rs"
///   - "md"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on concurrently running per-file units
    #[serde(default = "default_concurrency")]
    pub concurrency: NonZeroUsize,

    /// Number of dispatched units between cooperative yields
    #[serde(default = "default_yield_interval")]
    pub yield_interval: NonZeroUsize,

    /// Time limit for scanning one file; `None` disables it
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: Option<u64>,

    /// Time limit for one commit author lookup; `None` disables it
    #[serde(default = "default_author_timeout_ms")]
    pub author_timeout_ms: Option<u64>,

    /// Whether matching files get a commit author at all
    #[serde(default = "default_resolve_authors")]
    pub resolve_authors: bool,

    /// Patterns to ignore (supports glob syntax)
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Optional list of file extensions to include (e.g., ["rs", "toml"])
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_yield_interval() -> NonZeroUsize {
    NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN)
}

fn default_scan_timeout_ms() -> Option<u64> {
    Some(30_000)
}

fn default_author_timeout_ms() -> Option<u64> {
    Some(5_000)
}

fn default_resolve_authors() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            yield_interval: default_yield_interval(),
            scan_timeout_ms: default_scan_timeout_ms(),
            author_timeout_ms: default_author_timeout_ms(),
            resolve_authors: default_resolve_authors(),
            ignore_patterns: Vec::new(),
            file_extensions: None,
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, layering `config_path` over the default locations.
    ///
    /// An explicit path that does not exist is an error; missing default
    /// files are skipped.
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let default_files = [
            dirs::config_dir().map(|p| p.join("linescout/config.yaml")),
            Some(PathBuf::from(".linescout.yaml")),
        ];

        for path in default_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make every file fail.
    pub fn validate(&self) -> SearchResult<()> {
        if self.scan_timeout_ms == Some(0) {
            return Err(SearchError::config_error("scan_timeout_ms must be positive"));
        }
        if self.author_timeout_ms == Some(0) {
            return Err(SearchError::config_error(
                "author_timeout_ms must be positive",
            ));
        }
        Ok(())
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }

    pub fn author_timeout(&self) -> Option<Duration> {
        self.author_timeout_ms.map(Duration::from_millis)
    }

    /// Builder method to set the concurrency limit
    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder method to toggle commit author lookups
    pub fn with_resolve_authors(mut self, resolve_authors: bool) -> Self {
        self.resolve_authors = resolve_authors;
        self
    }

    /// Builder method to set ignore patterns
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Builder method to set file extensions to include
    pub fn with_file_extensions(mut self, extensions: Vec<String>) -> Self {
        self.file_extensions = Some(extensions);
        self
    }
}
