pub mod cache;
pub mod config;
pub mod context;
pub mod domain;
pub mod kernel;
pub mod metrics;
pub mod persistence;
pub mod session;
pub mod stores;

pub use context::AppContext;
