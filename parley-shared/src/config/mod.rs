//! Application configuration loading and validation.

pub mod server;

pub use server::{
    AssistantConfig, Config, ConfigError, DatabaseConfig, LogFormat, LoggingConfig, RealtimeConfig,
};
