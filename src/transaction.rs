//! Transaction module: plain value types, re-exported at the module root

pub mod types;

pub use types::*;
