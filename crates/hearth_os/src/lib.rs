pub mod audit;
pub mod jsonl;
pub mod local;
pub mod safety_net;
pub mod vcs;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use audit::{AuditTrail, ToolAuditEntry, ToolStatus};
pub use local::LocalExecutor;
pub use safety_net::{RollbackOutcome, SafetyNet, SafetySnapshot};
pub use vcs::{GitCli, VersionControl};

/// Runs shell commands on the host.
///
/// Implementors:
/// - `LocalExecutor`: `sh -c` in a given working directory, with a timeout
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `command` with `cwd` as working directory and return stdout.
    async fn execute(&self, command: &str, cwd: &Path) -> Result<String>;

    /// Executor name (for logs)
    fn name(&self) -> &str;
}
