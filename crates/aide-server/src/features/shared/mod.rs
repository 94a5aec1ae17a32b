//! Shared utilities for feature modules
//!
//! - **test_helpers**: in-memory store and on-disk fixtures (test-only)

#[cfg(test)]
pub mod test_helpers;
