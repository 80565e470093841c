use anyhow::Result;
use linescout::filters::FilePolicy;
use linescout::{
    AuthorResolver, CancellationToken, FoundFile, GitAuthorResolver, NoAuthorResolver,
    SearchConfig, SearchCoordinator, SearchOptions,
};
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

// Helper function to create test files, creating parent directories as needed
fn create_test_files(dir: impl AsRef<Path>, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        let path = dir.as_ref().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

fn coordinator(config: SearchConfig) -> SearchCoordinator {
    SearchCoordinator::with_resolver(config, Arc::new(NoAuthorResolver))
}

async fn search(options: SearchOptions) -> Result<Vec<FoundFile>> {
    Ok(coordinator(SearchConfig::default())
        .search(&options, &CancellationToken::new())
        .await?)
}

/// Results keyed by path relative to `root`, so ordering never matters
fn by_relative_path(root: &Path, found: &[FoundFile]) -> BTreeMap<String, Vec<usize>> {
    found
        .iter()
        .map(|f| {
            let rel = f
                .path()
                .strip_prefix(root)
                .unwrap_or(f.path())
                .to_string_lossy()
                .replace('\\', "/");
            (rel, f.line_numbers().to_vec())
        })
        .collect()
}

#[tokio::test]
async fn test_matching_lines_reported_per_file() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.txt", "foo\nbar\nfoo\n"), ("b.txt", "bar\n")])?;

    let found = search(SearchOptions::new("foo", dir.path())).await?;
    let results = by_relative_path(dir.path(), &found);

    assert_eq!(results.len(), 1);
    assert_eq!(results["a.txt"], vec![1, 3]);
    assert_eq!(found[0].line_numbers_display(), "1,3");
    Ok(())
}

#[tokio::test]
async fn test_empty_term_matches_every_line() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("three.txt", "one\ntwo\nthree\n")])?;

    let found = search(SearchOptions::new("", dir.path())).await?;
    let results = by_relative_path(dir.path(), &found);

    assert_eq!(results["three.txt"], vec![1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn test_empty_lines_keep_numbering() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("gaps.txt", "\n\nfoo\n\n\n\nfoo\n\n")])?;

    let found = search(SearchOptions::new("foo", dir.path())).await?;
    let results = by_relative_path(dir.path(), &found);

    assert_eq!(results["gaps.txt"], vec![3, 7]);
    Ok(())
}

#[tokio::test]
async fn test_hidden_file_policy() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            (".secret.txt", "token\n"),
            (".config/settings.txt", "token\n"),
            ("visible.txt", "token\n"),
        ],
    )?;

    let found = search(SearchOptions::new("token", dir.path())).await?;
    let results = by_relative_path(dir.path(), &found);
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["visible.txt"]);
    for rel in results.keys() {
        assert!(!rel.split('/').any(|c| c.starts_with('.')));
    }

    let options = SearchOptions::new("token", dir.path()).with_include_hidden(true);
    let found = search(options).await?;
    let results = by_relative_path(dir.path(), &found);
    assert!(results.contains_key(".secret.txt"));
    assert!(results.contains_key(".config/settings.txt"));
    assert!(results.contains_key("visible.txt"));
    Ok(())
}

#[tokio::test]
async fn test_subdirectory_and_package_flags() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("top.txt", "marker\n"),
            ("nested/inner.txt", "marker\n"),
            ("Viewer.app/Contents/Info.plist", "marker\n"),
        ],
    )?;

    let found = search(SearchOptions::new("marker", dir.path())).await?;
    let results = by_relative_path(dir.path(), &found);
    assert!(results.contains_key("top.txt"));
    assert!(results.contains_key("nested/inner.txt"));
    assert!(!results.contains_key("Viewer.app/Contents/Info.plist"));

    let options = SearchOptions::new("marker", dir.path()).with_include_package_descendants(true);
    let results = by_relative_path(dir.path(), &search(options).await?);
    assert!(results.contains_key("Viewer.app/Contents/Info.plist"));

    let options = SearchOptions::new("marker", dir.path()).with_include_subdirectories(false);
    let results = by_relative_path(dir.path(), &search(options).await?);
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["top.txt"]);
    Ok(())
}

#[tokio::test]
async fn test_binary_files_are_skipped() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("text.txt", "needle\n"), ("image.png", "needle\n")])?;
    fs::write(dir.path().join("blob.dat"), b"needle\n\0\0\0binary")?;

    let found = search(SearchOptions::new("needle", dir.path())).await?;
    let results = by_relative_path(dir.path(), &found);
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["text.txt"]);
    Ok(())
}

#[tokio::test]
async fn test_returned_files_satisfy_invariants() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("one.txt", "alpha\nbeta\nalpha beta\n\nalphabet\n"),
            ("two.md", "# beta\nalpha\n"),
            ("three.rs", "fn main() {}\n"),
            ("deep/four.txt", "\n\n\nalpha"),
        ],
    )?;

    let found = search(SearchOptions::new("alpha", dir.path())).await?;
    let policy = FilePolicy::new(false);
    assert_eq!(found.len(), 3);

    for file in &found {
        assert!(policy.is_text_file(file.path()));
        let lines = file.line_numbers();
        assert!(!lines.is_empty());
        assert!(lines.windows(2).all(|w| w[0] < w[1]));

        let content = fs::read_to_string(file.path())?;
        let all_lines: Vec<&str> = content.split('\n').collect();
        for &n in lines {
            assert!(all_lines[n - 1].contains("alpha"), "{:?} line {}", file.path(), n);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_repeated_search_is_stable() -> Result<()> {
    let dir = tempdir()?;
    for i in 0..20 {
        create_test_files(
            &dir,
            &[(
                format!("dir_{}/file_{}.txt", i % 4, i).as_str(),
                format!("header\nTODO {}\n\nTODO again\n", i).as_str(),
            )],
        )?;
    }

    let first = search(SearchOptions::new("TODO", dir.path())).await?;
    let second = search(SearchOptions::new("TODO", dir.path())).await?;

    assert_eq!(
        by_relative_path(dir.path(), &first),
        by_relative_path(dir.path(), &second)
    );
    assert_eq!(first.len(), 20);

    let first_ids: Vec<_> = first.iter().map(|f| f.id()).collect();
    assert!(second.iter().all(|f| !first_ids.contains(&f.id())));
    Ok(())
}

#[tokio::test]
async fn test_large_tree_with_bounded_concurrency() -> Result<()> {
    let dir = tempdir()?;
    let file_count = 1200;
    for i in 0..file_count {
        let path = dir.path().join(format!("d{}/f{}.txt", i % 30, i));
        fs::create_dir_all(path.parent().unwrap())?;
        let content = if i % 2 == 0 {
            "first\n\nneedle here\n\n\nneedle again\n"
        } else {
            "first\n\nnothing\n"
        };
        fs::write(path, content)?;
    }

    let config = SearchConfig::default().with_concurrency(NonZeroUsize::new(4).unwrap());
    let summary = coordinator(config)
        .search_with_summary(
            &SearchOptions::new("needle", dir.path()),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(summary.candidates, file_count);
    assert_eq!(summary.failed_units, 0);
    assert_eq!(summary.files_with_matches(), file_count / 2);
    assert!(summary.files.iter().all(|f| f.line_numbers() == [3, 6]));
    Ok(())
}

#[tokio::test]
async fn test_missing_root_yields_empty_result() -> Result<()> {
    let dir = tempdir()?;
    let missing: PathBuf = dir.path().join("nope");

    let found = search(SearchOptions::new("x", &missing)).await?;
    assert!(found.is_empty());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_entries_are_omitted() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("readable.txt", "needle\n"),
            ("nested/also.txt", "\nneedle\n"),
            ("locked_dir/inside.txt", "needle\n"),
            ("locked.txt", "needle\n"),
        ],
    )?;
    let locked_dir = dir.path().join("locked_dir");
    let locked_file = dir.path().join("locked.txt");
    fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o000))?;
    fs::set_permissions(&locked_file, fs::Permissions::from_mode(0o000))?;

    let unlock = || -> Result<()> {
        fs::set_permissions(&locked_dir, fs::Permissions::from_mode(0o755))?;
        fs::set_permissions(&locked_file, fs::Permissions::from_mode(0o644))?;
        Ok(())
    };

    // Permission bits do not bind root.
    if fs::File::open(&locked_file).is_ok() {
        return unlock();
    }

    let summary = coordinator(SearchConfig::default())
        .search_with_summary(
            &SearchOptions::new("needle", dir.path()),
            &CancellationToken::new(),
        )
        .await;
    unlock()?;
    let summary = summary?;

    let results = by_relative_path(dir.path(), &summary.files);
    assert_eq!(
        results.keys().collect::<Vec<_>>(),
        vec!["nested/also.txt", "readable.txt"]
    );
    assert_eq!(results["nested/also.txt"], vec![2]);
    // Unreadable files fail classification, so no unit is spent on them.
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.failed_units, 0);
    Ok(())
}

#[tokio::test]
async fn test_config_filters_apply() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("keep.rs", "needle\n"),
            ("skip.py", "needle\n"),
            ("generated/out.rs", "needle\n"),
        ],
    )?;

    let config = SearchConfig::default()
        .with_file_extensions(vec!["rs".to_string()])
        .with_ignore_patterns(vec!["**/generated/*".to_string()]);
    let found = coordinator(config)
        .search(
            &SearchOptions::new("needle", dir.path()),
            &CancellationToken::new(),
        )
        .await?;

    let results = by_relative_path(dir.path(), &found);
    assert_eq!(results.keys().collect::<Vec<_>>(), vec!["keep.rs"]);
    Ok(())
}

#[tokio::test]
async fn test_unversioned_file_has_no_author() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("plain.txt", "needle\n")])?;

    let config = SearchConfig::default();
    let resolver = Arc::new(GitAuthorResolver::new(config.author_timeout()));
    let found = SearchCoordinator::with_resolver(config, resolver)
        .search(
            &SearchOptions::new("needle", dir.path()),
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].author(), None);
    assert_eq!(found[0].author_display(), "");
    Ok(())
}

fn git(dir: &Path, args: &[&str]) -> Result<bool> {
    let status = std::process::Command::new("git")
        .args([
            "-c",
            "user.name=Test Author",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test Author")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test Author")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()?
        .status;
    Ok(status.success())
}

#[cfg(unix)]
#[tokio::test]
async fn test_author_lookup_treats_names_literally() -> Result<()> {
    let dir = tempdir()?;
    if std::process::Command::new("git").arg("--version").output().is_err() {
        return Ok(());
    }

    create_test_files(
        &dir,
        &[
            ("b.txt", "needle\n"),
            ("*.txt", "needle\n"),
            ("?.txt", "needle\n"),
            (":b.txt", "needle\n"),
        ],
    )?;
    if !git(dir.path(), &["init"])?
        || !git(dir.path(), &["add", "--", "b.txt"])?
        || !git(dir.path(), &["commit", "-m", "Add b"])?
    {
        return Ok(());
    }

    let resolver = GitAuthorResolver::default();
    assert_eq!(
        resolver.resolve_author(&dir.path().join("b.txt")).await,
        Some("Test Author".to_string())
    );
    for name in ["*.txt", "?.txt", ":b.txt"] {
        assert_eq!(
            resolver.resolve_author(&dir.path().join(name)).await,
            None,
            "{} is untracked",
            name
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_committed_file_reports_author() -> Result<()> {
    let dir = tempdir()?;
    if std::process::Command::new("git").arg("--version").output().is_err() {
        return Ok(());
    }

    create_test_files(
        &dir,
        &[("src/tracked.txt", "needle\n"), ("untracked.txt", "needle\n")],
    )?;
    if !git(dir.path(), &["init"])?
        || !git(dir.path(), &["add", "src/tracked.txt"])?
        || !git(dir.path(), &["commit", "-m", "Initial commit"])?
    {
        return Ok(());
    }

    let found = SearchCoordinator::new(SearchConfig::default())
        .search(
            &SearchOptions::new("needle", dir.path()),
            &CancellationToken::new(),
        )
        .await?;

    let authors: BTreeMap<String, String> = found
        .iter()
        .map(|f| {
            let rel = f
                .path()
                .strip_prefix(dir.path())
                .unwrap_or(f.path())
                .to_string_lossy()
                .replace('\\', "/");
            (rel, f.author_display().to_string())
        })
        .collect();

    assert_eq!(authors.len(), 2);
    assert_eq!(authors["src/tracked.txt"], "Test Author");
    assert_eq!(authors["untracked.txt"], "");
    Ok(())
}
