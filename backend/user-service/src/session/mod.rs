pub mod cache;
pub mod manager;

pub use cache::SessionCache;
pub use manager::{SessionError, SessionManager, SESSION_UNAUTHORIZED};
