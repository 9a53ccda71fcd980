//! Shared models and configuration for the Parley messaging backend.

pub mod config;
pub mod models;
