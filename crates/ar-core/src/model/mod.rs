//! Provider-agnostic completion API.

pub mod client;
pub mod types;
