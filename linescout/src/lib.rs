pub mod config;
pub mod errors;
pub mod filters;
pub mod logging;
pub mod options;
pub mod results;
pub mod search;
pub mod vcs;
pub mod walker;

pub use config::SearchConfig;
pub use errors::{SearchError, SearchResult};
pub use options::SearchOptions;
pub use results::{FoundFile, SearchSummary};
pub use search::{SearchCoordinator, SearchSession};
pub use tokio_util::sync::CancellationToken;
pub use vcs::{AuthorResolver, GitAuthorResolver, NoAuthorResolver};
pub use walker::{DirectoryWalker, WalkFlags};
