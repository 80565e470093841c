use ignore::{DirEntry, Walk, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Directory extensions that mark a bundle which should be treated as opaque
const PACKAGE_EXTENSIONS: &[&str] = &[
    "app",
    "appex",
    "bundle",
    "framework",
    "kext",
    "mpkg",
    "photoslibrary",
    "pkg",
    "playground",
    "plugin",
    "qlgenerator",
    "xcodeproj",
    "xcworkspace",
    "xpc",
];

/// Traversal switches for [`DirectoryWalker`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkFlags {
    /// Skip hidden files and do not descend into hidden directories
    pub skip_hidden: bool,
    /// Do not descend into package directories
    pub skip_package_descendants: bool,
    /// Only visit the root's direct children
    pub skip_subdirectory_descendants: bool,
}

/// Whether `path` names a package directory by extension.
pub fn is_package_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PACKAGE_EXTENSIONS
                .iter()
                .any(|pkg| pkg.eq_ignore_ascii_case(ext))
        })
}

fn is_package_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir()) && is_package_path(entry.path())
}

/// Walks the regular files strictly beneath a root.
///
/// No ignore files are consulted: every file the flags allow is considered.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    flags: WalkFlags,
}

impl DirectoryWalker {
    pub fn new(root: impl Into<PathBuf>, flags: WalkFlags) -> Self {
        Self {
            root: root.into(),
            flags,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts the walk, yielding only files for which `predicate` holds.
    ///
    /// The returned iterator is lazy and single-pass; directories are read
    /// as it is advanced.
    pub fn walk<P>(self, predicate: P) -> Candidates<P>
    where
        P: FnMut(&Path) -> bool,
    {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .hidden(self.flags.skip_hidden)
            .follow_links(false);

        if self.flags.skip_subdirectory_descendants {
            builder.max_depth(Some(1));
        }

        if self.flags.skip_package_descendants {
            builder.filter_entry(|entry| entry.depth() == 0 || !is_package_dir(entry));
        }

        Candidates {
            inner: builder.build(),
            predicate,
        }
    }
}

/// Lazy sequence of candidate files produced by [`DirectoryWalker::walk`]
pub struct Candidates<P> {
    inner: Walk,
    predicate: P,
}

impl<P> Iterator for Candidates<P>
where
    P: FnMut(&Path) -> bool,
{
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.into_path();
            if (self.predicate)(&path) {
                trace!("Candidate: {}", path.display());
                return Some(path);
            }
        }
    }
}
