//! Panic recovery
//!
//! Converts a panicking handler into a 500 and keeps the worker alive. The
//! panic hook records a backtrace on the panicking thread so the log carries
//! the stack of the panic site, not of the recovery point.

use error_types::ServiceError;
use futures::future::{ready, FutureExt};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Once;

use crate::api::{ApiHandler, ApiMiddleware, ApiRequest, HandlerFuture};

thread_local! {
    static LAST_PANIC_BACKTRACE: RefCell<Option<Backtrace>> = RefCell::new(None);
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            LAST_PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

fn take_backtrace() -> Backtrace {
    LAST_PANIC_BACKTRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(Backtrace::force_capture)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("handler panicked: {0}")]
pub struct PanicError(String);

fn recovered(payload: Box<dyn Any + Send>, method: &str, path: &str) -> ServiceError {
    let message = panic_message(payload.as_ref());
    let backtrace = take_backtrace();
    tracing::error!(
        method,
        path,
        panic = %message,
        stack = %backtrace,
        "recovered from panic in request handler"
    );
    ServiceError::system(PanicError(message))
}

/// Global middleware turning handler panics into internal errors.
#[derive(Clone)]
pub struct Recovery;

impl Recovery {
    pub fn new() -> Self {
        install_panic_hook();
        Recovery
    }
}

impl Default for Recovery {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiMiddleware for Recovery {
    fn wrap_handler(&self, next: ApiHandler) -> ApiHandler {
        Rc::new(move |req: ApiRequest| -> HandlerFuture {
            let method = req.http().method().to_string();
            let path = req.http().path().to_string();

            let fut = match panic::catch_unwind(AssertUnwindSafe(|| next(req))) {
                Ok(fut) => fut,
                Err(payload) => return Box::pin(ready(Err(recovered(payload, &method, &path)))),
            };

            Box::pin(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(recovered(payload, &method, &path)),
                }
            })
        })
    }
}
