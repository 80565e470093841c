use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Display format for modification timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A text file that contains the search term on at least one line.
///
/// Each record gets a fresh id, so searching the same tree twice yields
/// distinct records for the same paths.
#[derive(Debug, Clone)]
pub struct FoundFile {
    id: Uuid,
    path: PathBuf,
    line_numbers: Vec<usize>,
    modified: SystemTime,
    author: Option<String>,
}

impl FoundFile {
    /// Builds a record, or `None` when there are no matching lines.
    ///
    /// `line_numbers` must be strictly ascending, as produced by the scanner.
    pub fn new(
        path: PathBuf,
        line_numbers: Vec<usize>,
        modified: SystemTime,
        author: Option<String>,
    ) -> Option<Self> {
        if line_numbers.is_empty() {
            return None;
        }
        debug_assert!(line_numbers.windows(2).all(|w| w[0] < w[1]));

        Some(Self {
            id: Uuid::new_v4(),
            path,
            line_numbers,
            modified,
            author,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based, strictly ascending, never empty
    pub fn line_numbers(&self) -> &[usize] {
        &self.line_numbers
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Line numbers joined with commas, e.g. `1,3`
    pub fn line_numbers_display(&self) -> String {
        self.line_numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Modification time in local time, `yyyy-MM-dd HH:mm:ss`
    pub fn modified_display(&self) -> String {
        DateTime::<Local>::from(self.modified)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    /// Author name, or an empty string when unknown
    pub fn author_display(&self) -> &str {
        self.author.as_deref().unwrap_or("")
    }
}

/// Outcome of one search with bookkeeping counters
#[derive(Debug, Clone, Default)]
pub struct SearchSummary {
    /// Matching files in arrival order
    pub files: Vec<FoundFile>,
    /// Units dispatched, one per eligible candidate
    pub candidates: usize,
    /// Units that failed on stat, open, read, timeout or panic
    pub failed_units: usize,
    /// Wall time of the search
    pub elapsed: Duration,
}

impl SearchSummary {
    pub fn files_with_matches(&self) -> usize {
        self.files.len()
    }

    pub fn total_matching_lines(&self) -> usize {
        self.files.iter().map(|f| f.line_numbers.len()).sum()
    }
}
