//! Core types and trait definitions for the evidence registry.
//!
//! This crate is deliberately free of database and CLI dependencies. It owns
//! the data model (studies, claim tags, evidence links), the validation rules
//! that guard it, and the pure summary aggregation that turns a claim's links
//! into a confidence/gap verdict.

pub mod claim;
pub mod error;
pub mod export;
pub mod import;
pub mod link;
pub mod store;
pub mod study;
pub mod summary;

pub use error::{EntityKind, Error, Result};
