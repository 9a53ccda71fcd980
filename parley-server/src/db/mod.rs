//! Database startup plumbing.

pub mod bootstrap;
