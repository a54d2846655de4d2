//! Error taxonomy shared by every provisioning path.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`ProvError`].
pub type ProvResult<T> = Result<T, ProvError>;

/// Errors surfaced by the provisioning core.
///
/// Each variant maps onto a protocol-facing [`ErrorCode`] via
/// [`ProvError::code`], so the transport layer never needs to inspect
/// messages.
#[derive(Error, Diagnostic, Debug)]
pub enum ProvError {
    /// Missing or malformed request parameters.
    #[error("Invalid argument: {message}")]
    #[diagnostic(
        code(efsprov::invalid_argument),
        help("Fix the request parameters; retrying the same request will fail again")
    )]
    InvalidArgument {
        /// What was wrong with the input.
        message: String,
    },

    /// Credential or role problems reported by the remote service.
    #[error("Unauthenticated: {message}")]
    #[diagnostic(
        code(efsprov::unauthenticated),
        help("Verify the role has the right permissions for the file system")
    )]
    Unauthenticated {
        /// The error message.
        message: String,
    },

    /// A resource required to proceed does not exist.
    #[error("Not found: {resource}")]
    #[diagnostic(code(efsprov::not_found))]
    NotFound {
        /// The missing resource.
        resource: String,
    },

    /// The remote resource already exists.
    #[error("Already exists: {resource}")]
    #[diagnostic(code(efsprov::already_exists))]
    AlreadyExists {
        /// The conflicting resource.
        resource: String,
    },

    /// No free identity is left in the requested range.
    #[error("No free identity in range [{min}, {max}] for file system {file_system_id}")]
    #[diagnostic(
        code(efsprov::identity::exhausted),
        help("Widen gidRangeStart/gidRangeEnd or delete unused volumes")
    )]
    RangeExhausted {
        /// File system whose ledger is full.
        file_system_id: String,
        /// Lower bound of the requested range.
        min: u32,
        /// Upper bound of the requested range.
        max: u32,
    },

    /// Any other remote, mount, or filesystem failure.
    #[error("Internal error: {message}")]
    #[diagnostic(code(efsprov::internal))]
    Internal {
        /// Operation, target and cause.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(efsprov::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl ProvError {
    /// Create a [`ProvError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a [`ProvError::Unauthenticated`].
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a [`ProvError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The protocol status this error should be reported with.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::RangeExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::Internal { .. } | Self::Config { .. } => ErrorCode::Internal,
        }
    }
}

/// Protocol-facing status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Caller must fix the input.
    InvalidArgument,
    /// Credentials were rejected.
    Unauthenticated,
    /// Resource is missing.
    NotFound,
    /// Resource already exists.
    AlreadyExists,
    /// A finite pool ran out.
    ResourceExhausted,
    /// Everything else.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::Unauthenticated => "Unauthenticated",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::Internal => "Internal",
        };
        f.write_str(s)
    }
}
