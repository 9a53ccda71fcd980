//! Route assembly.

pub mod health;
