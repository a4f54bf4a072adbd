/// Service layer: user directory façade and external identity providers
pub mod oauth;
pub mod user_directory;

pub use user_directory::UserDirectory;
