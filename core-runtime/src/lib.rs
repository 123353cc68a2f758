//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Dropbox client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the auth and provider crates
//! depend on. It establishes the logging conventions, the validated
//! configuration and the broadcast channel carrying signed-in state.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
