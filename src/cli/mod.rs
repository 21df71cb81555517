//! Command-line interface for exercising the pool

pub mod bench;

pub use bench::*;
