//! Core domain + application logic for the train live-status bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the upstream
//! train-status API live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod delay;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod poller;
pub mod registry;
pub mod status;

pub use errors::{Error, Result};
