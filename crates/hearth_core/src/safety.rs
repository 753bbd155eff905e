use crate::config::SafetyConfig;
use crate::error::{HearthError, HearthResult};
use crate::trust::TrustTier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Action types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Read,
    Write,
    Commit,
    ShellExec,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Read => "read",
            ActionType::Write => "write",
            ActionType::Commit => "commit",
            ActionType::ShellExec => "shell_exec",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(ActionType::Read),
            "write" => Ok(ActionType::Write),
            "commit" => Ok(ActionType::Commit),
            "shell_exec" | "shell" | "exec" => Ok(ActionType::ShellExec),
            other => Err(HearthError::Validation(format!("unknown action type '{}'", other))),
        }
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Outcome of one permission check. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub action_type: ActionType,
    pub target_path: PathBuf,
    pub tier: TrustTier,
    pub allowed: bool,
    pub reason: String,
    /// A safety-net snapshot must be taken before the effect is applied.
    pub requires_snapshot: bool,
}

impl PermissionDecision {
    /// Convert a denial into the error callers propagate with `?`.
    pub fn into_result(self) -> HearthResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(HearthError::PermissionDenied {
                tier: self.tier,
                reason: self.reason,
            })
        }
    }
}

// ============================================================================
// PermissionMatrix
// ============================================================================

/// Tier-gated authorization rules.
///
/// The matrix holds only paths; trust is passed in on every call so a
/// change takes effect on the very next check.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    workspace_root: PathBuf,
    write_whitelist: Vec<PathBuf>,
    sandbox_dir: PathBuf,
}

impl PermissionMatrix {
    pub fn new(config: &SafetyConfig) -> Self {
        let workspace_root = normalize_lexically(&absolutize(&config.workspace_root));
        let anchor = |p: &PathBuf| {
            if p.is_absolute() {
                normalize_lexically(p)
            } else {
                normalize_lexically(&workspace_root.join(p))
            }
        };
        Self {
            write_whitelist: config.write_whitelist.iter().map(anchor).collect(),
            sandbox_dir: anchor(&config.sandbox_dir),
            workspace_root,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn sandbox_dir(&self) -> &Path {
        &self.sandbox_dir
    }

    /// Parse raw action/path strings, then check.
    pub fn check_raw(&self, trust: f32, action: &str, target: &str) -> HearthResult<PermissionDecision> {
        let action: ActionType = action.parse()?;
        self.check(trust, action, Path::new(target))
    }

    pub fn check(&self, trust: f32, action: ActionType, target: &Path) -> HearthResult<PermissionDecision> {
        let tier = TrustTier::from_trust(trust);
        let target_path = self.resolve(target)?;

        let (allowed, reason, requires_snapshot) = match tier {
            TrustTier::Surrogate => (true, "surrogate tier is unrestricted".to_string(), false),
            TrustTier::Stranger => match action {
                ActionType::Read => (true, "read access is open to every tier".to_string(), false),
                _ => (false, "stranger tier is read-only".to_string(), false),
            },
            TrustTier::Associate => match action {
                ActionType::Read => (true, "read access is open to every tier".to_string(), false),
                ActionType::Write if self.is_whitelisted(&target_path) => {
                    (true, "write target is inside the whitelist".to_string(), false)
                }
                ActionType::Write => (
                    false,
                    format!("'{}' is outside the write whitelist", target_path.display()),
                    false,
                ),
                ActionType::Commit | ActionType::ShellExec => (
                    false,
                    format!("{} requires partner tier or above", action),
                    false,
                ),
            },
            TrustTier::Partner => match action {
                ActionType::Read => (true, "read access is open to every tier".to_string(), false),
                ActionType::Write | ActionType::Commit => (
                    true,
                    "partner tier may write once a safety-net snapshot is taken".to_string(),
                    true,
                ),
                ActionType::ShellExec if self.in_sandbox(&target_path) => {
                    (true, "shell working directory is inside the sandbox".to_string(), false)
                }
                ActionType::ShellExec => (
                    false,
                    format!(
                        "shell execution below surrogate tier is confined to '{}'",
                        self.sandbox_dir.display()
                    ),
                    false,
                ),
            },
        };

        tracing::debug!(
            tier = %tier,
            action = %action,
            path = %target_path.display(),
            allowed,
            "permission check"
        );

        Ok(PermissionDecision {
            action_type: action,
            target_path,
            tier,
            allowed,
            reason,
            requires_snapshot,
        })
    }

    /// Resolve a target against the workspace root and strip `.`/`..`.
    pub fn resolve(&self, target: &Path) -> HearthResult<PathBuf> {
        let raw = target.as_os_str();
        if raw.is_empty() {
            return Err(HearthError::Validation("target path is empty".to_string()));
        }
        if raw.to_string_lossy().contains('\0') {
            return Err(HearthError::Validation("target path contains a NUL byte".to_string()));
        }
        let joined = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.workspace_root.join(target)
        };
        Ok(normalize_lexically(&joined))
    }

    fn is_whitelisted(&self, path: &Path) -> bool {
        self.write_whitelist.iter().any(|allowed| is_within(path, allowed))
    }

    fn in_sandbox(&self, path: &Path) -> bool {
        is_within(path, &self.sandbox_dir)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Compare canonical forms only, so a symlink inside `root` cannot lead the
/// target outside it, while symlinked roots (e.g. /tmp → /private/tmp on
/// macOS) still match.
fn is_within(path: &Path, root: &Path) -> bool {
    canonicalize_best_effort(path).starts_with(canonicalize_best_effort(root))
}

/// Canonicalize the deepest existing ancestor and re-attach the rest, so
/// paths that do not exist yet still resolve through symlinks.
fn canonicalize_best_effort(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(&existing) {
            let mut out = canonical;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
