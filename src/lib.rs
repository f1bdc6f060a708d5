pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod market;
pub mod risk;
pub mod services;

pub use config::AppConfig;
pub use error::{MultitradeError, Result};
pub use market::PrecisionResolver;
pub use services::{OrderLifecycleExecutor, SignalDistributor};
