//! Core domain + application logic for the customer-service handoff plugin.
//!
//! This crate is intentionally framework-agnostic. The chat host and the
//! WeCom customer-service API live behind ports (traits) implemented in
//! adapter crates.

pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod handoff;
pub mod logging;
pub mod messaging;
pub mod policy;
pub mod ports;

pub use errors::{Error, Result};
