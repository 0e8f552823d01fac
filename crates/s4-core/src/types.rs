//! Core S4 domain types.
//!
//! This module provides the service enumeration, repository locations, endpoint
//! URL templates and the API credential pair used to authenticate requests.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, Result};

/// Default S4 domain.
pub const DEFAULT_HOST: &str = "s4.ontotext.com";

/// Placeholder for the S4 domain in endpoint templates.
pub const HOST_PLACEHOLDER: &str = "<host>";
/// Placeholder for the user identifier in endpoint templates.
pub const USER_ID_PLACEHOLDER: &str = "<user-id>";
/// Placeholder for the database identifier in endpoint templates.
pub const DB_ID_PLACEHOLDER: &str = "<db-id>";
/// Placeholder for the repository name in endpoint templates.
pub const REPO_NAME_PLACEHOLDER: &str = "<repo-name>";

/// Template of the SPARQL update endpoint of a hosted repository.
pub const STATEMENTS_TEMPLATE: &str =
    "https://rdf.<host>/<user-id>/<db-id>/repositories/<repo-name>/statements";

/// Template of the SPARQL query endpoint of a hosted repository.
pub const REPOSITORY_TEMPLATE: &str =
    "https://rdf.<host>/<user-id>/<db-id>/repositories/<repo-name>";

/// S4 services reachable under the S4 domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S4Service {
    /// Hosted RDF databases (SPARQL endpoints)
    Rdf,
    /// Text analytics REST API
    Text,
}

impl S4Service {
    /// Returns the service name as a string.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Rdf => "rdf",
            Self::Text => "text",
        }
    }

    /// Returns all available services.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Rdf, Self::Text]
    }

    /// Base URL of the service under the given S4 domain, e.g. `https://rdf.s4.ontotext.com/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `host` does not form a valid URL.
    pub fn base_url(&self, host: &str) -> Result<Url> {
        Url::parse(&format!("https://{}.{host}/", self.name()))
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid S4 host `{host}`: {err}")))
    }
}

impl FromStr for S4Service {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rdf" => Ok(Self::Rdf),
            "text" => Ok(Self::Text),
            _ => Err(Error::InvalidRequest(format!("Unknown service: {s}"))),
        }
    }
}

impl std::fmt::Display for S4Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// API key and secret used to authenticate against S4.
///
/// The secret is kept in a [`SecretString`] and never appears in `Debug` output.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCredentials {
    api_key: String,
    key_secret: SecretString,
}

impl ApiCredentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(api_key: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            key_secret: SecretString::from(key_secret.into()),
        }
    }

    /// The API key identifier (HTTP basic user name).
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The API key secret (HTTP basic password).
    #[must_use]
    pub fn key_secret(&self) -> &str {
        self.key_secret.expose_secret()
    }
}

/// Identifies a repository hosted in an S4 database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocation {
    host: String,
    user_id: String,
    db_id: String,
    repository: String,
}

impl RepositoryLocation {
    /// Create a location on the default S4 domain.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        db_id: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            user_id: user_id.into(),
            db_id: db_id.into(),
            repository: repository.into(),
        }
    }

    /// Override the S4 domain.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// S4 domain.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// User identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Database identifier.
    #[must_use]
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    /// Repository name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// URL accepting SPARQL queries for this repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if an identifier is empty or not a single path segment.
    pub fn repository_url(&self) -> Result<Url> {
        let mut url = S4Service::Rdf.base_url(&self.host)?;
        let segments = [
            check_segment("user id", &self.user_id)?,
            check_segment("database id", &self.db_id)?,
            "repositories",
            check_segment("repository name", &self.repository)?,
        ];

        url.path_segments_mut()
            .map_err(|()| Error::InvalidEndpoint("S4 base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL accepting SPARQL updates for this repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if an identifier is empty or not a single path segment.
    pub fn statements_url(&self) -> Result<Url> {
        let mut url = self.repository_url()?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidEndpoint("S4 base URL cannot take a path".to_string()))?
            .push("statements");
        Ok(url)
    }
}

fn check_segment<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(Error::InvalidEndpoint(format!("Empty {what}")));
    }
    if matches!(value, "." | "..")
        || value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '%' | '?' | '#' | '<' | '>') || c.is_whitespace())
    {
        return Err(Error::InvalidEndpoint(format!(
            "Invalid {what} `{value}`: must be a single path segment"
        )));
    }
    Ok(value)
}

/// Endpoint URL template with `<host>`, `<user-id>`, `<db-id>` and `<repo-name>` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    template: String,
}

impl EndpointTemplate {
    /// Create a template from an arbitrary string.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The S4 SPARQL update endpoint template.
    #[must_use]
    pub fn statements() -> Self {
        Self::new(STATEMENTS_TEMPLATE)
    }

    /// The S4 SPARQL query endpoint template.
    #[must_use]
    pub fn repository() -> Self {
        Self::new(REPOSITORY_TEMPLATE)
    }

    /// The raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute the location's identifiers into the template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if an identifier is not a single path segment, if a
    /// `<...>` placeholder is left unresolved, or if the result is not a valid URL.
    pub fn render(&self, location: &RepositoryLocation) -> Result<Url> {
        if location.host.is_empty() || location.host.contains(['/', '<', '>']) {
            return Err(Error::InvalidEndpoint(format!(
                "Invalid S4 host `{}`",
                location.host
            )));
        }

        let rendered = self
            .template
            .replace(HOST_PLACEHOLDER, &location.host)
            .replace(USER_ID_PLACEHOLDER, check_segment("user id", &location.user_id)?)
            .replace(DB_ID_PLACEHOLDER, check_segment("database id", &location.db_id)?)
            .replace(
                REPO_NAME_PLACEHOLDER,
                check_segment("repository name", &location.repository)?,
            );

        if let Some(start) = rendered.find('<') {
            let placeholder: String = rendered[start..]
                .chars()
                .take_while(|c| *c != '>')
                .chain(std::iter::once('>'))
                .collect();
            return Err(Error::InvalidEndpoint(format!(
                "Unresolved placeholder {placeholder} in `{}`",
                self.template
            )));
        }

        Url::parse(&rendered)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid endpoint `{rendered}`: {err}")))
    }
}

impl Default for EndpointTemplate {
    fn default() -> Self {
        Self::statements()
    }
}

impl std::fmt::Display for EndpointTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_names() {
        assert_eq!(S4Service::Rdf.name(), "rdf");
        assert_eq!(S4Service::Text.to_string(), "text");
        assert_eq!(S4Service::all().len(), 2);
        assert_eq!("RDF".parse::<S4Service>().unwrap(), S4Service::Rdf);
        assert!("sparql".parse::<S4Service>().is_err());
    }

    #[test]
    fn test_service_base_url() {
        let url = S4Service::Text.base_url(DEFAULT_HOST).unwrap();
        assert_eq!(url.as_str(), "https://text.s4.ontotext.com/");
    }

    #[test]
    fn test_statements_url() {
        let location = RepositoryLocation::new("u1", "db2", "myrepo");
        assert_eq!(
            location.statements_url().unwrap().as_str(),
            "https://rdf.s4.ontotext.com/u1/db2/repositories/myrepo/statements"
        );
        assert_eq!(
            location.repository_url().unwrap().as_str(),
            "https://rdf.s4.ontotext.com/u1/db2/repositories/myrepo"
        );
    }

    #[test]
    fn test_statements_url_custom_host() {
        let location = RepositoryLocation::new("u1", "db2", "myrepo").with_host("s4.example.org");
        assert_eq!(
            location.statements_url().unwrap().as_str(),
            "https://rdf.s4.example.org/u1/db2/repositories/myrepo/statements"
        );
    }

    #[test]
    fn test_invalid_segments_rejected() {
        assert!(RepositoryLocation::new("", "db", "repo")
            .statements_url()
            .is_err());
        assert!(RepositoryLocation::new("u", "d/b", "repo")
            .repository_url()
            .is_err());
        assert!(RepositoryLocation::new("u", "db", "my repo")
            .statements_url()
            .is_err());
    }

    #[test]
    fn test_dot_and_escape_segments_rejected() {
        for value in [".", "..", "a\\b", "a%2Fb", "100%"] {
            let location = RepositoryLocation::new("u1", "db2", value);
            assert!(
                matches!(location.statements_url(), Err(Error::InvalidEndpoint(_))),
                "statements_url accepted `{value}`"
            );
            assert!(
                matches!(
                    EndpointTemplate::statements().render(&location),
                    Err(Error::InvalidEndpoint(_))
                ),
                "render accepted `{value}`"
            );
        }

        let err = RepositoryLocation::new("..", "db", "repo")
            .statements_url()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint(_)));

        // dots inside an identifier are fine
        let location = RepositoryLocation::new("u1", "db.v2", "my..repo");
        assert_eq!(
            location.statements_url().unwrap().as_str(),
            "https://rdf.s4.ontotext.com/u1/db.v2/repositories/my..repo/statements"
        );
    }

    #[test]
    fn test_template_matches_location_urls() {
        let location = RepositoryLocation::new("user-7", "db-42", "books");
        assert_eq!(
            EndpointTemplate::statements().render(&location).unwrap(),
            location.statements_url().unwrap()
        );
        assert_eq!(
            EndpointTemplate::repository().render(&location).unwrap(),
            location.repository_url().unwrap()
        );
    }

    #[test]
    fn test_template_render_exact() {
        let template = EndpointTemplate::new(
            "https://rdf.s4.ontotext.com/<user-id>/<db-id>/repositories/<repo-name>/statements",
        );
        let url = template
            .render(&RepositoryLocation::new("1234", "abcd", "myrepo"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://rdf.s4.ontotext.com/1234/abcd/repositories/myrepo/statements"
        );
    }

    #[test]
    fn test_template_unresolved_placeholder() {
        let template = EndpointTemplate::new("https://rdf.<host>/<tenant>/repositories/<repo-name>");
        let err = template
            .render(&RepositoryLocation::new("u", "d", "r"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidEndpoint(
                "Unresolved placeholder <tenant> in `https://rdf.<host>/<tenant>/repositories/<repo-name>`"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_credentials_hide_secret() {
        let credentials = ApiCredentials::new("s4-key", "s4-secret");
        assert_eq!(credentials.api_key(), "s4-key");
        assert_eq!(credentials.key_secret(), "s4-secret");
        assert!(!format!("{credentials:?}").contains("s4-secret"));
    }

    #[test]
    fn test_credentials_deserialize() {
        let credentials: ApiCredentials =
            serde_json::from_str(r#"{"api_key": "k", "key_secret": "s"}"#).unwrap();
        assert_eq!(credentials.api_key(), "k");
        assert_eq!(credentials.key_secret(), "s");
    }
}
