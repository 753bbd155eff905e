use crate::trust::TrustTier;

/// Errors that cross component boundaries.
///
/// Dependency and state failures are normally absorbed where they happen
/// (logged, then degraded); permission and tool outcomes are always handed
/// back to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HearthError {
    /// Malformed action, path or tool arguments.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The live trust tier does not allow the requested action.
    #[error("permission denied at {tier} tier: {reason}")]
    PermissionDenied { tier: TrustTier, reason: String },

    /// Vector index, embedder or generation collaborator unreachable.
    #[error("{dependency} unavailable: {reason}")]
    DependencyUnavailable {
        dependency: &'static str,
        reason: String,
    },

    /// The persisted limbic record could not be parsed.
    #[error("corrupted state record: {0}")]
    CorruptedState(String),

    /// The underlying action failed. `snapshot_ref` points at the safety-net
    /// commit taken before the action, if one was taken.
    #[error("tool execution failed: {message}")]
    ToolExecution {
        message: String,
        snapshot_ref: Option<String>,
    },
}

impl HearthError {
    pub fn dependency(dependency: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::DependencyUnavailable {
            dependency,
            reason: reason.to_string(),
        }
    }
}

pub type HearthResult<T> = Result<T, HearthError>;
