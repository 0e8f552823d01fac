//! SPARQL client for repositories hosted on Ontotext S4.
//!
//! Provides asynchronous update and query operations against the SPARQL
//! endpoints of an S4 database, authenticated with an API key pair, and typed
//! models for the SPARQL 1.1 JSON results format.
//!
//! ```no_run
//! use s4_core::{ApiCredentials, RepositoryLocation};
//! use s4_sparql::SparqlClient;
//!
//! # async fn run() -> s4_sparql::Result<()> {
//! let client = SparqlClient::builder(RepositoryLocation::new("my-user-id", "my-db-id", "myrepo"))?
//!     .with_credentials(ApiCredentials::new("<s4-api-key>", "<s4-key-secret>"))
//!     .build()?;
//!
//! client
//!     .update(
//!         "PREFIX dc: <http://purl.org/dc/elements/1.1/>
//!          INSERT { <http://example/egbook> dc:title \"This is an example title\" } WHERE {}",
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod transport;

pub use client::{SparqlClient, SparqlClientBuilder};
pub use models::{QueryMethod, QueryOptions, QueryResults, Solutions, Term, UpdateEncoding};
pub use transport::{HttpTransport, SparqlRequest, SparqlResponse, SparqlTransport};

/// Convenient result alias that reuses the shared S4 error type.
pub type Result<T> = s4_core::Result<T>;
