pub mod auth;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod realtime;
pub mod services;

pub use auth::AuthService;
pub use config::Config;
pub use realtime::RealtimeHub;
