use std::path::PathBuf;

use crate::walker::WalkFlags;

/// Inputs of a single search invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Literal, case-sensitive term. Empty matches every line.
    pub term: String,

    /// Directory whose descendants are searched
    pub root_path: PathBuf,

    /// Search hidden files and descend into hidden directories
    pub include_hidden: bool,

    /// Descend into package directories such as `Foo.app`
    pub include_package_descendants: bool,

    /// Descend below the root's direct children
    pub include_subdirectories: bool,
}

impl SearchOptions {
    /// Creates options with the given term and root path
    pub fn new(term: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            term: term.into(),
            root_path: root_path.into(),
            include_hidden: false,
            include_package_descendants: false,
            include_subdirectories: true,
        }
    }

    /// Builder method to include hidden files
    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Builder method to descend into package directories
    pub fn with_include_package_descendants(mut self, include: bool) -> Self {
        self.include_package_descendants = include;
        self
    }

    /// Builder method to descend into subdirectories
    pub fn with_include_subdirectories(mut self, include: bool) -> Self {
        self.include_subdirectories = include;
        self
    }

    /// Translates the inclusion booleans into walker skip flags
    pub fn walk_flags(&self) -> WalkFlags {
        WalkFlags {
            skip_hidden: !self.include_hidden,
            skip_package_descendants: !self.include_package_descendants,
            skip_subdirectory_descendants: !self.include_subdirectories,
        }
    }
}
