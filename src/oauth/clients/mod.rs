//! API client management.
//!
//! Provisions clients with generated credentials and removes them.

pub mod provisioning;

pub use provisioning::{
    ClientService, CreateClientRequest, CreateClientResponse, DeleteClientRequest,
};
