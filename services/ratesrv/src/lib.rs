//! RateSrv Library
//!
//! HTTP surface over the shipping rate engine.
//!
//! ## Architecture
//!
//! - `config`: figment-layered configuration (defaults, YAML, `RATESRV_` env)
//! - `app`: shared state holding the engine
//! - `api`: handlers, one module per resource
//! - `error`: engine error to HTTP envelope mapping

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod routes;

// Re-export app state and initialization
pub use app::{create_app_state, preload, AppState};
pub use config::{Config, ConfigError};

// Re-export route creation
pub use routes::create_routes;
