//! Core domain + application logic for the auto-reply service.
//!
//! This crate is intentionally framework-agnostic. WhatsApp / Telegram /
//! OpenAI live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod history;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod pipeline;
pub mod prompt;

pub use errors::{Error, Result};
