//! Helpers shared by adapters.
pub mod fs;
