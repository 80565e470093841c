use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::scanner::scan_file;
use crate::config::SearchConfig;
use crate::errors::{SearchError, SearchResult};
use crate::filters::FilePolicy;
use crate::options::SearchOptions;
use crate::results::{FoundFile, SearchSummary};
use crate::vcs::{AuthorResolver, GitAuthorResolver, NoAuthorResolver};
use crate::walker::DirectoryWalker;

/// Candidates buffered between the walker thread and the dispatcher
const CANDIDATE_CHANNEL_CAPACITY: usize = 256;

/// What one per-file unit produced
#[derive(Debug)]
enum UnitOutcome {
    Found(FoundFile),
    NoMatch,
    Failed,
    Cancelled,
}

/// Everything a unit needs, shared read-only across units
#[derive(Debug)]
struct UnitContext {
    term: String,
    resolver: Arc<dyn AuthorResolver>,
    scan_timeout: Option<Duration>,
}

impl UnitContext {
    async fn inspect(&self, path: PathBuf) -> UnitOutcome {
        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!("Failed to read metadata for {}: {}", path.display(), e);
                return UnitOutcome::Failed;
            }
        };

        let scan = scan_file(&path, &self.term);
        let scanned = match self.scan_timeout {
            Some(limit) => match tokio::time::timeout(limit, scan).await {
                Ok(result) => result,
                Err(_) => Err(SearchError::timeout(&path, limit)),
            },
            None => scan.await,
        };

        let lines = match scanned {
            Ok(lines) => lines,
            Err(e @ SearchError::Timeout { .. }) => {
                warn!("{}", e);
                return UnitOutcome::Failed;
            }
            Err(e) => {
                debug!("Failed to scan {}: {}", path.display(), e);
                return UnitOutcome::Failed;
            }
        };

        if lines.is_empty() {
            return UnitOutcome::NoMatch;
        }

        let author = self.resolver.resolve_author(&path).await;
        match FoundFile::new(path, lines, modified, author) {
            Some(found) => UnitOutcome::Found(found),
            None => UnitOutcome::NoMatch,
        }
    }
}

/// Runs searches: walks, classifies, scans and attributes files concurrently.
#[derive(Debug, Clone)]
pub struct SearchCoordinator {
    config: SearchConfig,
    resolver: Arc<dyn AuthorResolver>,
}

impl SearchCoordinator {
    /// Creates a coordinator with the resolver implied by `config`
    pub fn new(config: SearchConfig) -> Self {
        let resolver: Arc<dyn AuthorResolver> = if config.resolve_authors {
            Arc::new(GitAuthorResolver::new(config.author_timeout()))
        } else {
            Arc::new(NoAuthorResolver)
        };
        Self { config, resolver }
    }

    /// Creates a coordinator with an explicit author resolver
    pub fn with_resolver(config: SearchConfig, resolver: Arc<dyn AuthorResolver>) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Searches `options.root_path` and returns the matching files in arrival order.
    ///
    /// Returns [`SearchError::Cancelled`] if `cancel` fires before the search
    /// completes; no partial results are delivered in that case.
    pub async fn search(
        &self,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchResult<Vec<FoundFile>> {
        Ok(self.search_with_summary(options, cancel).await?.files)
    }

    /// Like [`search`](Self::search) but also reports counters
    pub async fn search_with_summary(
        &self,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> SearchResult<SearchSummary> {
        info!(
            "Starting search for {:?} under {}",
            options.term,
            options.root_path.display()
        );
        let started = Instant::now();
        let mut units = JoinSet::new();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            summary = self.fan_out(options, cancel, &mut units) => Some(summary),
        };

        match outcome {
            Some(mut summary) if !cancel.is_cancelled() => {
                summary.elapsed = started.elapsed();
                info!(
                    "Search complete. Found {} matching lines in {} of {} files ({} failed) in {:?}",
                    summary.total_matching_lines(),
                    summary.files_with_matches(),
                    summary.candidates,
                    summary.failed_units,
                    summary.elapsed
                );
                Ok(summary)
            }
            _ => {
                // Abort and await every unit so no file handle outlives the search.
                units.shutdown().await;
                info!("Search cancelled after {:?}", started.elapsed());
                Err(SearchError::Cancelled)
            }
        }
    }

    async fn fan_out(
        &self,
        options: &SearchOptions,
        cancel: &CancellationToken,
        units: &mut JoinSet<UnitOutcome>,
    ) -> SearchSummary {
        let mut candidates = self.spawn_walk(options, cancel.clone());
        let limiter = Arc::new(Semaphore::new(self.config.concurrency.get()));
        let context = Arc::new(UnitContext {
            term: options.term.clone(),
            resolver: Arc::clone(&self.resolver),
            scan_timeout: self.config.scan_timeout(),
        });
        let yield_interval = self.config.yield_interval.get();
        let mut summary = SearchSummary::default();

        while let Some(path) = candidates.recv().await {
            let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
                break;
            };
            let context = Arc::clone(&context);
            let token = cancel.clone();
            units.spawn(async move {
                let _permit = permit;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => UnitOutcome::Cancelled,
                    outcome = context.inspect(path) => outcome,
                }
            });

            summary.candidates += 1;
            if summary.candidates % yield_interval == 0 {
                tokio::task::yield_now().await;
            }

            while let Some(joined) = units.try_join_next() {
                record(&mut summary, joined);
            }
        }

        while let Some(joined) = units.join_next().await {
            record(&mut summary, joined);
        }
        summary
    }

    /// Walks on a blocking thread and streams eligible paths back.
    ///
    /// The walk stops as soon as the receiver is dropped or `cancel` fires.
    fn spawn_walk(
        &self,
        options: &SearchOptions,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<PathBuf> {
        let (tx, rx) = mpsc::channel(CANDIDATE_CHANNEL_CAPACITY);
        let walker = DirectoryWalker::new(options.root_path.clone(), options.walk_flags());
        let policy = FilePolicy::from_config(options.include_hidden, &self.config);

        tokio::task::spawn_blocking(move || {
            for path in walker.walk(|p| policy.is_text_file(p)) {
                if cancel.is_cancelled() || tx.blocking_send(path).is_err() {
                    debug!("Directory walk stopped early");
                    break;
                }
            }
        });
        rx
    }
}

fn record(summary: &mut SearchSummary, joined: Result<UnitOutcome, JoinError>) {
    match joined {
        Ok(UnitOutcome::Found(found)) => summary.files.push(found),
        Ok(UnitOutcome::NoMatch) | Ok(UnitOutcome::Cancelled) => {}
        Ok(UnitOutcome::Failed) => summary.failed_units += 1,
        Err(e) => {
            warn!("Search unit did not complete: {}", e);
            summary.failed_units += 1;
        }
    }
}

/// Runs one search at a time; starting a search cancels the previous one.
#[derive(Debug)]
pub struct SearchSession {
    coordinator: SearchCoordinator,
    current: Mutex<CancellationToken>,
}

impl SearchSession {
    pub fn new(coordinator: SearchCoordinator) -> Self {
        Self {
            coordinator,
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn coordinator(&self) -> &SearchCoordinator {
        &self.coordinator
    }

    /// Invalidates the current token and issues a fresh one
    pub fn begin(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = CancellationToken::new();
        current.clone()
    }

    /// Cancels the running search, if any, without starting another
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Starts a search that supersedes any search still running in this session
    pub async fn search(&self, options: &SearchOptions) -> SearchResult<Vec<FoundFile>> {
        let token = self.begin();
        self.coordinator.search(options, &token).await
    }
}
