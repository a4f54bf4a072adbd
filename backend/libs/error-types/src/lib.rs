//! Domain error taxonomy for the user service
//!
//! Every failure that crosses a layer boundary is eventually classified into one
//! [`ErrorKind`]. Handlers return [`ServiceError`]; the transport layer turns it
//! into a status code with [`status_from_error`], which also understands errors
//! wrapped by context layers or aggregated in an [`ErrorList`].
//!
//! # Design Principles
//!
//! 1. **Closed taxonomy**: a fixed set of kinds, each with one status code
//! 2. **Context Preservation**: the original cause stays reachable via `source()`
//! 3. **No silent gaps**: unclassified errors are logged before defaulting to 500

use std::error::Error as StdError;
use std::fmt;

pub mod http;
mod status;

pub use status::status_from_error;

/// Boxed error carried as the cause of a [`ServiceError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Unauthorized,
    Forbidden,
    Unavailable,
    NotModified,
    NotImplemented,
    /// Unexpected failure, storage error or logic bug.
    Internal,
    DeadlineExceeded,
    Canceled,
    DataLoss,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        use http::status;

        match self {
            ErrorKind::NotFound => status::NOT_FOUND,
            ErrorKind::InvalidArgument => status::BAD_REQUEST,
            ErrorKind::Conflict => status::CONFLICT,
            ErrorKind::Unauthorized => status::UNAUTHORIZED,
            ErrorKind::Forbidden => status::FORBIDDEN,
            ErrorKind::Unavailable => status::SERVICE_UNAVAILABLE,
            ErrorKind::NotModified => status::NOT_MODIFIED,
            ErrorKind::NotImplemented => status::NOT_IMPLEMENTED,
            ErrorKind::Internal
            | ErrorKind::DeadlineExceeded
            | ErrorKind::Canceled
            | ErrorKind::DataLoss => status::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(self) -> bool {
        self.status_code() >= 500
    }
}

/// A classified error.
///
/// `Display` is the wrapped error's message, so 4xx responses can show it verbatim.
///
/// # Example
/// ```rust
/// use error_types::{ErrorKind, ServiceError};
///
/// let err = ServiceError::invalid_argument("invalid password");
/// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
/// assert_eq!(err.to_string(), "invalid password");
/// ```
pub struct ServiceError {
    kind: ErrorKind,
    source: BoxError,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn not_found(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::NotFound, source)
    }

    pub fn invalid_argument(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::InvalidArgument, source)
    }

    pub fn conflict(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Conflict, source)
    }

    pub fn unauthorized(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unauthorized, source)
    }

    pub fn forbidden(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Forbidden, source)
    }

    pub fn unavailable(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unavailable, source)
    }

    pub fn not_implemented(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::NotImplemented, source)
    }

    pub fn deadline_exceeded(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::DeadlineExceeded, source)
    }

    /// Unexpected failure. The message is never shown to clients.
    pub fn system(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Internal, source)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl fmt::Debug for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceError")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl StdError for ServiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Several independent failures reported together.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<BoxError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: impl Into<BoxError>) {
        self.errors.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        self.errors
            .iter()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl FromIterator<BoxError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = BoxError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl StdError for ErrorList {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_to_status() {
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::InvalidArgument.status_code(), 400);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ErrorKind::Unavailable.status_code(), 503);
        assert_eq!(ErrorKind::NotModified.status_code(), 304);
        assert_eq!(ErrorKind::NotImplemented.status_code(), 501);
        for kind in [
            ErrorKind::Internal,
            ErrorKind::DeadlineExceeded,
            ErrorKind::Canceled,
            ErrorKind::DataLoss,
        ] {
            assert_eq!(kind.status_code(), 500);
            assert!(kind.is_server_error());
        }
    }

    #[test]
    fn test_display_is_inner_message() {
        let err = ServiceError::conflict("user already exists");
        assert_eq!(err.to_string(), "user already exists");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_list_display() {
        let mut list = ErrorList::new();
        list.push("first");
        list.push(ServiceError::conflict("second"));
        assert_eq!(list.len(), 2);
        assert_eq!(list.to_string(), "first; second");
    }
}
