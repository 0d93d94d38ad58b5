use crate::{config::ConfigError, record::PatchError, store::StoreError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// AccessError
///
/// Structured error surfaced by the record access layer.
/// `kind` is the stable classification consumers branch on; `message` is
/// always human-readable and says what to change.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct AccessError {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    pub detail: Option<ErrorDetail>,
}

impl AccessError {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a criteria-origin validation failure.
    pub(crate) fn criteria_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, ErrorOrigin::Criteria, message)
    }

    /// Construct a criteria-origin unsupported query error.
    pub(crate) fn criteria_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueryUnsupported, ErrorOrigin::Criteria, message)
    }

    /// Construct a scope-origin permission error.
    pub(crate) fn scope_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, ErrorOrigin::Scope, message)
    }

    /// Construct a session-origin error for operations on a disposed list.
    pub(crate) fn detached() -> Self {
        Self::new(
            ErrorKind::Detached,
            ErrorOrigin::Session,
            "record list has been disposed; create a new list to search again",
        )
    }

    /// Classify a raw store failure into an actionable access error.
    #[must_use]
    pub fn from_store(err: StoreError) -> Self {
        let (kind, message) = match &err {
            StoreError::Unavailable { message } => (
                ErrorKind::StoreUnreachable,
                format!(
                    "the record store could not be reached ({message}); check the connection and refresh to try again"
                ),
            ),
            StoreError::Timeout => (
                ErrorKind::StoreUnreachable,
                "the record store did not respond in time; refresh to try again".to_string(),
            ),
            StoreError::PermissionDenied { message } => (
                ErrorKind::PermissionDenied,
                format!(
                    "you are not allowed to read these records ({message}); limit the search to your own records or ask an administrator for access"
                ),
            ),
            StoreError::FailedPrecondition { message } => (
                ErrorKind::QueryUnsupported,
                format!(
                    "the store cannot run this combination of filters and sort ({message}); remove a filter or sort by the default field"
                ),
            ),
            StoreError::InvalidArgument { message } => (
                ErrorKind::ValidationFailed,
                format!("the store rejected the request ({message}); correct the search values"),
            ),
            StoreError::NotFound { id } => (
                ErrorKind::ValidationFailed,
                format!("record {id} no longer exists; refresh the list"),
            ),
        };

        Self {
            kind,
            origin: ErrorOrigin::Store,
            message,
            detail: Some(ErrorDetail::Store(err)),
        }
    }

    /// Whether a caller-driven retry (`refresh`) may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::StoreUnreachable)
    }

    /// Whether the error ends the current session's pagination.
    /// Anything a retry cannot fix is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.kind, self.message)
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        Self::from_store(err)
    }
}

impl From<ConfigError> for AccessError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::ValidationFailed, ErrorOrigin::Config, err.to_string())
    }
}

impl From<PatchError> for AccessError {
    fn from(err: PatchError) -> Self {
        Self {
            kind: ErrorKind::ValidationFailed,
            origin: ErrorOrigin::Overlay,
            message: err.to_string(),
            detail: Some(ErrorDetail::Patch(err)),
        }
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`AccessError`].
///

#[derive(Clone, Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
    #[error("{0}")]
    Patch(PatchError),
}

///
/// ErrorKind
/// Classification consumers branch on.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Detached,
    PermissionDenied,
    QueryUnsupported,
    StoreUnreachable,
    ValidationFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Detached => "detached",
            Self::PermissionDenied => "permission_denied",
            Self::QueryUnsupported => "query_unsupported",
            Self::StoreUnreachable => "store_unreachable",
            Self::ValidationFailed => "validation_failed",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Which layer produced the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Criteria,
    Scope,
    Store,
    Overlay,
    Session,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Criteria => "criteria",
            Self::Scope => "scope",
            Self::Store => "store",
            Self::Overlay => "overlay",
            Self::Session => "session",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
