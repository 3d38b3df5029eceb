use crate::frame::FrameId;

/// Boxed error raised by business logic running inside a frame.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for transaction management
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure raised by a participant (repository, service) inside a frame
    #[error("Participant failure: {0}")]
    Participant(#[source] BoxError),

    /// Commit was requested but the physical transaction had been marked rollback-only
    #[error("Transaction silently rolled back because it has been marked as rollback-only (frame {frame})")]
    UnexpectedRollback { frame: FrameId },

    /// `commit`/`rollback` was called on a frame that is not the top of the stack
    #[error("Frame {frame} is not the current frame (top: {top:?})")]
    FrameOrdering { frame: FrameId, top: Option<FrameId> },

    /// The frame stack or the resource binding is inconsistent
    #[error("Transaction context corrupted: {0}")]
    ContextCorrupted(String),

    /// The resource was used while no physical transaction was bound
    #[error("No active transaction")]
    NoActiveTransaction,
}

impl Error {
    /// Wraps a business failure so it can travel through a frame.
    pub fn participant(err: impl Into<BoxError>) -> Self {
        Self::Participant(err.into())
    }

    /// Returns `true` for failures raised by participants rather than by the manager itself.
    pub fn is_participant_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Participant(_))
    }

    /// Returns `true` if this is an [`Error::UnexpectedRollback`].
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, Self::UnexpectedRollback { .. })
    }
}

/// Result type alias for transaction operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_failures_are_classified() {
        assert!(Error::participant("boom").is_participant_failure());
        assert!(Error::Database(sqlx::Error::RowNotFound).is_participant_failure());
        assert!(!Error::NoActiveTransaction.is_participant_failure());

        let err = Error::UnexpectedRollback { frame: FrameId(3) };
        assert!(err.is_unexpected_rollback());
        assert!(!err.is_participant_failure());
    }

    #[test]
    fn participant_message_is_kept() {
        let err = Error::participant("log write failed");
        assert_eq!(err.to_string(), "Participant failure: log write failed");
    }
}
