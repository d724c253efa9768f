pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod platform;
pub mod pool;
pub mod processor;
pub mod scanner;

pub use config::{AppConfig, CliArgs};
pub use engine::{RecompressEngine, RunReport};
pub use error::Error;
