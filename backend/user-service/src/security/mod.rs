/// Security utilities: password hashing, cookies and session authentication
pub mod cookies;
pub mod password;
pub mod session_auth;

pub use password::{hash_password, verify_password, PasswordError};
pub use session_auth::{session_auth, SessionCookieResolver};
