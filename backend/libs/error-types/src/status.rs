//! Error-to-status translation

use std::error::Error as StdError;

use crate::http::status;
use crate::{ErrorList, ServiceError};

/// Map an error to an HTTP status code.
///
/// The outermost [`ServiceError`] wins. Otherwise the chain is unwrapped: an
/// [`ErrorList`] yields the first member that classifies to something other
/// than 500, any other error is followed through `source()`. Errors with no
/// classifiable cause are logged and reported as 500.
pub fn status_from_error(err: &(dyn StdError + 'static)) -> u16 {
    if let Some(service_err) = err.downcast_ref::<ServiceError>() {
        return service_err.status_code();
    }

    if let Some(list) = err.downcast_ref::<ErrorList>() {
        return list
            .iter()
            .map(status_from_error)
            .find(|code| *code != status::INTERNAL_SERVER_ERROR)
            .unwrap_or(status::INTERNAL_SERVER_ERROR);
    }

    match err.source() {
        Some(cause) => status_from_error(cause),
        None => {
            tracing::debug!(
                error = %err,
                error_debug = ?err,
                "unmatched error type, defaulting to internal server error"
            );
            status::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoxError, ErrorKind};
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped {
        inner: BoxError,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapped: {}", self.inner)
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(self.inner.as_ref())
        }
    }

    #[test]
    fn test_direct_classification() {
        let err = ServiceError::unauthorized("session expired or not found");
        assert_eq!(status_from_error(&err), 401);

        let err = ServiceError::new(ErrorKind::Canceled, "client went away");
        assert_eq!(status_from_error(&err), 500);
    }

    #[test]
    fn test_single_cause_chain() {
        let err = Wrapped {
            inner: Box::new(Wrapped {
                inner: Box::new(ServiceError::conflict("user already exists")),
            }),
        };
        assert_eq!(status_from_error(&err), 409);
    }

    #[test]
    fn test_anyhow_context_is_unwrapped() {
        let err = anyhow::Error::new(ServiceError::not_found("no such user"))
            .context("loading profile")
            .context("handling request");
        let dyn_err: &(dyn StdError + Send + Sync + 'static) = err.as_ref();
        assert_eq!(status_from_error(dyn_err), 404);
    }

    #[test]
    fn test_error_list_prefers_first_non_internal() {
        let list: ErrorList = vec![
            Box::new(ServiceError::system("db down")) as BoxError,
            Box::new(std::io::Error::new(std::io::ErrorKind::Other, "plain")),
            Box::new(ServiceError::invalid_argument("bad email")),
            Box::new(ServiceError::conflict("dup")),
        ]
        .into_iter()
        .collect();
        assert_eq!(status_from_error(&list), 400);
    }

    #[test]
    fn test_error_list_nested_in_wrapper() {
        let mut list = ErrorList::new();
        list.push(ServiceError::forbidden("not yours"));
        let err = Wrapped {
            inner: Box::new(list),
        };
        assert_eq!(status_from_error(&err), 403);
    }

    #[test]
    fn test_unclassified_defaults_to_internal() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(status_from_error(&err), 500);

        let all_internal: ErrorList = vec![Box::new(ServiceError::system("x")) as BoxError]
            .into_iter()
            .collect();
        assert_eq!(status_from_error(&all_internal), 500);
    }
}
