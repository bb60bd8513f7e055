// core.rs splits ledger responsibilities into submodules.
pub mod chain;
pub mod hasher;
pub mod validation;

pub use chain::*;
pub use hasher::*;
pub use validation::*;
