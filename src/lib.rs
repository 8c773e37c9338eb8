//! BileMo API backend library crate.
//!
//! Provides per-client user login with OAuth 2.0 token issuance, client
//! credential validation, client provisioning and per-client user access.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
