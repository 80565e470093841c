use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Looks up who last committed a file.
///
/// Resolution is best effort: implementations return `None` on any failure
/// and never abort the search that asked.
#[async_trait]
pub trait AuthorResolver: Send + Sync + std::fmt::Debug {
    async fn resolve_author(&self, path: &Path) -> Option<String>;
}

/// Resolver that never knows an author
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthorResolver;

#[async_trait]
impl AuthorResolver for NoAuthorResolver {
    async fn resolve_author(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Runs `git log -1` scoped to a single file, one process per call.
///
/// The file name is passed as a literal pathspec so names such as `*.txt`
/// or `:b.txt` never match other files.
#[derive(Debug, Clone)]
pub struct GitAuthorResolver {
    program: OsString,
    timeout: Option<Duration>,
}

impl GitAuthorResolver {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            program: OsString::from("git"),
            timeout,
        }
    }

    /// Uses another executable in place of `git`
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, path: &Path) -> Option<Command> {
        let file_name = path.file_name()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .args(["--literal-pathspecs", "log", "-1", "--format=%an", "--"])
            .arg(file_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        Some(cmd)
    }
}

impl Default for GitAuthorResolver {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(5)))
    }
}

/// Extracts the author from `git log` output; blank output means untracked.
pub fn parse_author(stdout: &[u8]) -> Option<String> {
    let author = String::from_utf8_lossy(stdout).trim().to_string();
    if author.is_empty() {
        None
    } else {
        Some(author)
    }
}

#[async_trait]
impl AuthorResolver for GitAuthorResolver {
    async fn resolve_author(&self, path: &Path) -> Option<String> {
        let mut cmd = self.command(path)?;

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Author lookup timed out after {:?}: {}",
                        limit,
                        path.display()
                    );
                    return None;
                }
            },
            None => cmd.output().await,
        };

        match output {
            Ok(output) if output.status.success() => parse_author(&output.stdout),
            Ok(output) => {
                debug!(
                    "Author lookup exited with {} for {}",
                    output.status,
                    path.display()
                );
                None
            }
            Err(e) => {
                debug!("Failed to run author lookup for {}: {}", path.display(), e);
                None
            }
        }
    }
}
