//! In-memory storage implementations
//!
//! This module provides in-memory implementations of all storage traits.
//! These implementations are suitable for development and testing.

mod oauth;

pub use oauth::MemoryBileMoStorage;
