pub mod clients;
pub mod config;
pub mod domain;
pub mod http;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod store;
pub mod utils;

pub use config::AppConfig;
pub use domain::order::{OrderError, OrderOrchestrator};
