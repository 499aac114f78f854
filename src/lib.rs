pub mod analyzers;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod infra;
pub mod loader;
pub mod output;
pub mod prediction;
pub mod record;
pub mod schema;
pub mod services;
