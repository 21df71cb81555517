//! Utility functions for the pool

pub mod time;
pub mod url;

pub use time::*;
pub use url::*;
