//! Shared configuration and logging for the HLS relay.

pub mod bootstrap;
pub mod config;
pub mod logging;

pub use bootstrap::load_config;
pub use config::Config;
