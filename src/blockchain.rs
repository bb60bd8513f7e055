// Thin re-export module: implementation lives under `blockchain/core/` so block
// modelling, hashing and chain validation stay in separate files.

pub mod core;
pub use core::*;
