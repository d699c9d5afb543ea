//! Error taxonomy for Gao.

use thiserror::Error;

/// Result alias used across the Gao crates.
pub type GaoResult<T> = Result<T, GaoError>;

/// Errors surfaced by the client and the codec.
#[derive(Debug, Error)]
pub enum GaoError {
    /// The channel could not complete a read or write (peer gone, broken pipe).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The peer sent a line that does not match the grammar.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The subprocess answered a create request with `ERR:<code>`.
    #[error("gaolette creation failed with error code {code}: {failure}")]
    Creation {
        code: i32,
        failure: CreationFailure,
    },

    /// Create failed outright (empty response or a `-1` reply), no code attached.
    #[error("gaolette creation failed: {0}")]
    CreationRejected(String),

    /// The subprocess refused a non-create operation.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// The operation is not valid for the Gaolette or channel in its current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The subprocess or its channel could not be set up.
    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl GaoError {
    /// Wraps a transport-level I/O error with a short context prefix.
    pub fn transport(context: &str, err: std::io::Error) -> Self {
        GaoError::Transport(format!("{}: {}", context, err))
    }

    /// Builds the creation error for an `ERR:<code>` reply.
    pub fn creation(code: i32) -> Self {
        GaoError::Creation {
            code,
            failure: CreationFailure::from_code(code),
        }
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, GaoError::Protocol(_))
    }
}

/// Classification of the code carried by an `ERR:<code>` create reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationFailure {
    Unknown,
    InvalidSpec,
    InsufficientResources,
    PermissionDenied,
    /// A code outside the known set. Still surfaced, with a generic message.
    Unrecognized(i32),
}

impl CreationFailure {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => CreationFailure::Unknown,
            1 => CreationFailure::InvalidSpec,
            2 => CreationFailure::InsufficientResources,
            3 => CreationFailure::PermissionDenied,
            other => CreationFailure::Unrecognized(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            CreationFailure::Unknown => -1,
            CreationFailure::InvalidSpec => 1,
            CreationFailure::InsufficientResources => 2,
            CreationFailure::PermissionDenied => 3,
            CreationFailure::Unrecognized(code) => *code,
        }
    }

    /// Human-readable classification.
    pub fn description(&self) -> &'static str {
        match self {
            CreationFailure::Unknown => "unknown error occurred during gaolette creation",
            CreationFailure::InvalidSpec => "invalid performance specification provided",
            CreationFailure::InsufficientResources => {
                "insufficient system resources to create gaolette"
            }
            CreationFailure::PermissionDenied => "permission denied to create gaolette",
            CreationFailure::Unrecognized(_) => "unrecognized error code",
        }
    }
}

impl std::fmt::Display for CreationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_classify() {
        assert_eq!(CreationFailure::from_code(-1), CreationFailure::Unknown);
        assert_eq!(CreationFailure::from_code(1), CreationFailure::InvalidSpec);
        assert_eq!(
            CreationFailure::from_code(2),
            CreationFailure::InsufficientResources
        );
        assert_eq!(CreationFailure::from_code(3), CreationFailure::PermissionDenied);
    }

    #[test]
    fn test_unknown_code_is_kept() {
        let failure = CreationFailure::from_code(77);
        assert_eq!(failure, CreationFailure::Unrecognized(77));
        assert_eq!(failure.code(), 77);
        assert_eq!(failure.description(), "unrecognized error code");
    }

    #[test]
    fn test_creation_error_message_carries_code_and_reason() {
        let message = GaoError::creation(2).to_string();
        assert!(message.contains("error code 2"));
        assert!(message.contains("insufficient system resources"));
    }
}
