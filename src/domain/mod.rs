//! Domain layer types and invariants.

pub mod access;
pub mod entities;
pub mod error;
pub mod types;
