//! ABI (Application Binary Interface) module for the EVM DVN contract
//!
//! - Standard head/tail encoding of the admin calls
//! - `abi.encodePacked` for digest preimages
//! - Function selector calculation

pub mod encoder;
pub mod selector;
pub mod types;

pub use encoder::*;
pub use selector::*;
pub use types::*;
