/// Text file classification.
///
/// A candidate is eligible when it is not hidden (unless the caller asked for
/// hidden files), is not excluded by an ignore glob or the extension allow-list,
/// and looks like text. Text detection is two-staged: a cheap extension
/// deny-list of well known binary formats, then a sniff of the first block of
/// the file for NUL bytes.
use glob::Pattern;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::SearchConfig;

/// Number of leading bytes inspected when sniffing content
pub const SNIFF_LEN: usize = 8192;

/// Checks if a file should be included in the search based on its extension
pub fn has_valid_extension(path: &Path, extensions: &Option<Vec<String>>) -> bool {
    match extensions {
        None => true,
        Some(exts) => {
            if let Some(ext) = path.extension() {
                if let Some(ext_str) = ext.to_str() {
                    return exts.iter().any(|e| e.eq_ignore_ascii_case(ext_str));
                }
            }
            false
        }
    }
}

/// Checks if a file should be ignored based on compiled ignore globs
pub fn should_ignore(path: &Path, ignore_patterns: &[Pattern]) -> bool {
    if ignore_patterns.is_empty() {
        return false;
    }

    let normalized_path = path.to_string_lossy().replace('\\', "/");
    ignore_patterns.iter().any(|p| p.matches(&normalized_path))
}

/// Checks if a file is likely to be binary from its extension alone
pub fn is_likely_binary(path: &Path) -> bool {
    const BINARY_EXTENSIONS: &[&str] = &[
        "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", "lib", "class", "jar", "war", "ear",
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "tiff", "webp", "heic", "pdf", "doc", "docx",
        "xls", "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "dmg", "iso",
        "mp3", "mp4", "mov", "avi", "wav", "flac", "ttf", "otf", "woff", "woff2", "sqlite", "db",
    ];

    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return BINARY_EXTENSIONS
                .iter()
                .any(|&bin_ext| bin_ext.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}

/// Whether the entry itself (not its ancestors) is hidden.
#[cfg(not(windows))]
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Whether the entry itself (not its ancestors) is hidden.
#[cfg(windows)]
pub fn is_hidden(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    let dotted = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    dotted
        || std::fs::metadata(path)
            .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
            .unwrap_or(false)
}

/// Reads at most [`SNIFF_LEN`] bytes and reports whether they look like text.
///
/// Empty files count as text.
pub fn sniff_is_text(path: &Path) -> io::Result<bool> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(looks_like_text(&head))
}

/// A block is text when it carries no NUL byte.
pub fn looks_like_text(block: &[u8]) -> bool {
    memchr::memchr(0, block).is_none()
}

/// Eligibility policy for one search.
#[derive(Debug, Clone, Default)]
pub struct FilePolicy {
    include_hidden: bool,
    file_extensions: Option<Vec<String>>,
    ignore_patterns: Vec<Pattern>,
}

impl FilePolicy {
    /// Creates a policy that only looks at the hidden flag and file content
    pub fn new(include_hidden: bool) -> Self {
        Self {
            include_hidden,
            ..Default::default()
        }
    }

    /// Creates a policy with the extension and ignore filters from `config`.
    ///
    /// Malformed globs are logged and dropped.
    pub fn from_config(include_hidden: bool, config: &SearchConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Ignoring malformed ignore pattern {:?}: {}", raw, e);
                    None
                }
            })
            .collect();

        Self {
            include_hidden,
            file_extensions: config.file_extensions.clone(),
            ignore_patterns,
        }
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Checks everything that can be decided without touching file content
    pub fn passes_name_filters(&self, path: &Path) -> bool {
        (self.include_hidden || !is_hidden(path))
            && has_valid_extension(path, &self.file_extensions)
            && !should_ignore(path, &self.ignore_patterns)
            && !is_likely_binary(path)
    }

    /// Determines if a file is an eligible text file under this policy
    pub fn is_text_file(&self, path: &Path) -> bool {
        if !self.passes_name_filters(path) {
            return false;
        }

        match sniff_is_text(path) {
            Ok(is_text) => {
                if !is_text {
                    debug!("Skipping binary content: {}", path.display());
                }
                is_text
            }
            Err(e) => {
                debug!("Failed to classify {}: {}", path.display(), e);
                false
            }
        }
    }
}
