//! # s4-core
//!
//! Core types and utilities for working with the Ontotext S4 hosted RDF service.
//!
//! This crate provides the error type, credentials, configuration, endpoint
//! construction and HTTP client settings shared by the S4 client crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code classification
//! - [`types`] - Repository locations, endpoint templates and API credentials
//! - [`config`] - Validated configuration for S4 clients
//! - [`client`] - HTTP client settings and retry policy
//! - [`query`] - Query-string parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{ApiCredentials, EndpointTemplate, RepositoryLocation, S4Service};
