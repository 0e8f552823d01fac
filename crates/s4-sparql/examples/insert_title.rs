//! Insert a single statement into an S4-hosted repository.
//!
//! Fill in the API key pair and identifiers of your S4 database, then run
//! `cargo run -p s4-sparql --example insert_title`.

use s4_core::{ApiCredentials, RepositoryLocation};
use s4_sparql::SparqlClient;

const API_KEY: &str = "s4-api-key";
const KEY_SECRET: &str = "s4-key-secret";
const USER_ID: &str = "user-id";
const DB_ID: &str = "db-id";
const REPOSITORY: &str = "myrepo";

const UPDATE: &str = "PREFIX dc: <http://purl.org/dc/elements/1.1/>
INSERT { <http://example/egbook> dc:title  \"This is an example title\" }
WHERE {}
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = SparqlClient::builder(RepositoryLocation::new(USER_ID, DB_ID, REPOSITORY))?
        .with_credentials(ApiCredentials::new(API_KEY, KEY_SECRET))
        .build()?;

    println!("Sending update to {}", client.update_endpoint());
    client.update(UPDATE).await?;

    let stored = client
        .ask("ASK { <http://example/egbook> <http://purl.org/dc/elements/1.1/title> ?title }")
        .await?;
    println!("Title stored: {stored}");

    Ok(())
}
