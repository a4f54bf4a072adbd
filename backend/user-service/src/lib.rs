pub mod app_state;
pub mod background;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod validators;

pub use app_state::AppState;
pub use config::Config;
