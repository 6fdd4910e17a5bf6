//! HTTP and realtime surface over the inventory engine.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;

pub use config::{AppConfig, ConfigError};
