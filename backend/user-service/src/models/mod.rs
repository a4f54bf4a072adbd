pub mod session;
pub mod user;

pub use session::{IssuedSession, NewSession, Session};
pub use user::{
    FindUser, NewLocalUser, OAuthIdentity, Provider, Role, UpdateUser, User, UserStatus,
};
