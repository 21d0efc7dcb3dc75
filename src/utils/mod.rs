//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod crypto;
pub mod http;
pub mod logging;

pub use crypto::*;
