//! # Scorewave Common Library
//!
//! Shared code for Scorewave services including:
//! - Error type shared by stores and configuration
//! - TOML bootstrap configuration loading
//! - Root folder resolution and initialization

pub mod config;
pub mod error;

pub use error::{Error, Result};
