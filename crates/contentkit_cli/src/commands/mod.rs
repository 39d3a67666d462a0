//! CLI command implementations.

pub mod hash;
pub mod inspect;
pub mod sweep;
