//! Actor implementations

pub mod fleet;
