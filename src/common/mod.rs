//! Common types and utilities shared across the crate.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`BTreeConfig`]
//! - Error types
//! - The [`BlockId`] block address

pub mod config;
pub mod error;
mod block_id;

pub use block_id::BlockId;
pub use config::BTreeConfig;
pub use error::{Error, Result};
