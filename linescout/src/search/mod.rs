/// Concurrent search over a directory tree.
///
/// A search is one coordinating task plus one unit per eligible file:
///
/// 1. A blocking thread walks the tree, classifies each regular file and
///    streams the text files through a bounded channel.
/// 2. The coordinator spawns a unit per candidate into a `JoinSet`, holding a
///    semaphore permit per unit so at most `concurrency` files (and git
///    processes) are open at once. Every `yield_interval` dispatches it yields
///    to the scheduler.
/// 3. A unit stats the file, scans it line by line, and only on a match asks
///    the [`AuthorResolver`](crate::vcs::AuthorResolver) for the last author.
/// 4. Finished units are reaped in completion order; failures are counted and
///    dropped.
///
/// Cancellation aborts and awaits every unit before returning, so file
/// handles never outlive the search.
pub mod engine;
pub mod scanner;

pub use engine::{SearchCoordinator, SearchSession};
pub use scanner::{scan_file, scan_reader, LineMatcher};
