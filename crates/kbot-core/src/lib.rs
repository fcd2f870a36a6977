//! Core domain + application logic for the knowledge-base chat bot.
//!
//! This crate is framework-agnostic. Telegram and the Anthropic API live behind
//! ports (traits) implemented in adapter crates.

pub mod admin;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod quota;
pub mod router;
pub mod state;

pub use errors::{Error, Result};
