//! Shared HTTP response types.

pub mod error;
pub mod problem;
