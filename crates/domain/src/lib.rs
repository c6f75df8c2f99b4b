//! Shared data model, error taxonomy, and configuration schema for the
//! response orchestration core. Every other crate in the workspace
//! depends on this one and nothing else upstream of it.

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, ErrorKind, Result};
