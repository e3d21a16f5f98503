//! # Lectary Common Library
//!
//! Shared code for the lectary admin services:
//! - Error types
//! - Configuration loading and data-folder resolution
//! - Database pool initialization and schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
