//! OCTP core library: signed trust envelopes for code contributions

pub mod checks;
pub mod config;
pub mod envelope;
pub mod error;
pub mod git;
pub mod integrity;

pub use error::{OctpError, Result};
