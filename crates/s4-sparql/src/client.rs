//! Asynchronous SPARQL client for S4-hosted repositories.

use crate::models::{
    QueryMethod, QueryOptions, QueryResults, UpdateEncoding, FORM_URLENCODED, SPARQL_QUERY,
    SPARQL_RESULTS_JSON, SPARQL_UPDATE,
};
use crate::transport::{HttpTransport, SparqlRequest, SparqlResponse, SparqlTransport};
use crate::Result;
use reqwest::Method;
use s4_core::client::{ClientConfig, RetryPolicy};
use s4_core::config::S4ClientConfig;
use s4_core::{ApiCredentials, EndpointTemplate, Error, RepositoryLocation};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::form_urlencoded;
use url::Url;

/// Builder for [`SparqlClient`].
#[derive(Clone)]
pub struct SparqlClientBuilder {
    query_endpoint: Url,
    update_endpoint: Url,
    http_config: ClientConfig,
    retry_policy: RetryPolicy,
    credentials: Option<ApiCredentials>,
    update_encoding: UpdateEncoding,
    query_method: QueryMethod,
    query_options: QueryOptions,
    transport: Option<Arc<dyn SparqlTransport>>,
}

impl SparqlClientBuilder {
    /// Create a builder for a repository on S4.
    ///
    /// Queries go to `https://rdf.<host>/<user-id>/<db-id>/repositories/<repo-name>` and
    /// updates to the `/statements` endpoint below it.
    pub fn new(location: &RepositoryLocation) -> Result<Self> {
        Ok(Self::with_endpoints(
            location.repository_url()?,
            location.statements_url()?,
        ))
    }

    /// Create a builder from explicit query and update endpoint URLs.
    pub fn from_urls(query_url: impl AsRef<str>, update_url: impl AsRef<str>) -> Result<Self> {
        let parse = |url: &str| {
            Url::parse(url).map_err(|err| {
                Error::ConfigError(format!("Invalid SPARQL endpoint URL `{url}`: {err}"))
            })
        };
        Ok(Self::with_endpoints(
            parse(query_url.as_ref())?,
            parse(update_url.as_ref())?,
        ))
    }

    /// Create a builder by rendering endpoint templates for a repository.
    pub fn from_templates(
        query_template: &EndpointTemplate,
        update_template: &EndpointTemplate,
        location: &RepositoryLocation,
    ) -> Result<Self> {
        Ok(Self::with_endpoints(
            query_template.render(location)?,
            update_template.render(location)?,
        ))
    }

    /// Create a builder from a validated [`S4ClientConfig`], including its credentials
    /// and HTTP settings.
    pub fn from_config(config: &S4ClientConfig) -> Result<Self> {
        config.check()?;
        Ok(Self::new(&config.location())?
            .with_credentials(config.credentials())
            .with_http_config(config.http_config()))
    }

    fn with_endpoints(query_endpoint: Url, update_endpoint: Url) -> Self {
        let http_config = ClientConfig::new();
        Self {
            query_endpoint,
            update_endpoint,
            retry_policy: http_config.retry_policy,
            http_config,
            credentials: None,
            update_encoding: UpdateEncoding::default(),
            query_method: QueryMethod::default(),
            query_options: QueryOptions::default(),
            transport: None,
        }
    }

    /// Attach the API key pair sent with every request.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the retry policy used for queries.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.retry_policy = config.retry_policy;
        self.http_config = config;
        self
    }

    /// Choose how updates are encoded.
    #[must_use]
    pub fn with_update_encoding(mut self, encoding: UpdateEncoding) -> Self {
        self.update_encoding = encoding;
        self
    }

    /// Choose the HTTP method used for queries.
    #[must_use]
    pub fn with_query_method(mut self, method: QueryMethod) -> Self {
        self.query_method = method;
        self
    }

    /// Protocol parameters attached to every query.
    #[must_use]
    pub fn with_query_options(mut self, options: QueryOptions) -> Self {
        self.query_options = options;
        self
    }

    /// Use a custom transport instead of the `reqwest` one.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn SparqlTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<SparqlClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.http_config)?),
        };

        Ok(SparqlClient {
            transport,
            query_endpoint: self.query_endpoint,
            update_endpoint: self.update_endpoint,
            retry_policy: self.retry_policy,
            credentials: self.credentials,
            update_encoding: self.update_encoding,
            query_method: self.query_method,
            query_options: self.query_options,
        })
    }
}

/// Asynchronous SPARQL client bound to one repository.
#[derive(Clone)]
pub struct SparqlClient {
    transport: Arc<dyn SparqlTransport>,
    query_endpoint: Url,
    update_endpoint: Url,
    retry_policy: RetryPolicy,
    credentials: Option<ApiCredentials>,
    update_encoding: UpdateEncoding,
    query_method: QueryMethod,
    query_options: QueryOptions,
}

impl SparqlClient {
    /// Start a builder for a repository on S4.
    pub fn builder(location: RepositoryLocation) -> Result<SparqlClientBuilder> {
        SparqlClientBuilder::new(&location)
    }

    /// Construct a client directly from the configuration.
    pub fn from_config(config: &S4ClientConfig) -> Result<Self> {
        SparqlClientBuilder::from_config(config)?.build()
    }

    /// Endpoint receiving queries.
    #[must_use]
    pub fn query_endpoint(&self) -> &Url {
        &self.query_endpoint
    }

    /// Endpoint receiving updates.
    #[must_use]
    pub fn update_endpoint(&self) -> &Url {
        &self.update_endpoint
    }

    /// Build the POST request carrying `update`, with credentials attached.
    ///
    /// The update text is placed in the body unmodified (or as the single
    /// `update` form field with [`UpdateEncoding::UrlEncoded`]).
    #[must_use]
    pub fn update_request(&self, update: &str) -> SparqlRequest {
        let request = SparqlRequest::new(Method::POST, self.update_endpoint.clone());
        let request = match self.update_encoding {
            UpdateEncoding::Direct => request.with_body(SPARQL_UPDATE, update),
            UpdateEncoding::UrlEncoded => {
                let form = form_urlencoded::Serializer::new(String::new())
                    .append_pair("update", update)
                    .finish();
                request.with_body(FORM_URLENCODED, form)
            }
        };
        request.with_credentials(self.credentials.clone())
    }

    /// Build the request carrying `query`, asking for `accept`.
    #[must_use]
    pub fn query_request(&self, query: &str, accept: &str) -> SparqlRequest {
        let mut url = self.query_endpoint.clone();
        let options = self.query_options.to_params();

        let request = match self.query_method {
            QueryMethod::Get => {
                url.query_pairs_mut()
                    .append_pair("query", query)
                    .extend_pairs(options.as_pairs());
                SparqlRequest::new(Method::GET, url)
            }
            QueryMethod::Post => {
                if !options.is_empty() {
                    url.query_pairs_mut().extend_pairs(options.as_pairs());
                }
                SparqlRequest::new(Method::POST, url).with_body(SPARQL_QUERY, query)
            }
        };

        request
            .with_accept(accept)
            .with_credentials(self.credentials.clone())
    }

    /// Execute a SPARQL update.
    ///
    /// The update is sent exactly once; it is never retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for blank updates, the transport error if the
    /// service could not be reached, or the error matching the HTTP status.
    pub async fn update(&self, update: &str) -> Result<()> {
        if update.trim().is_empty() {
            return Err(Error::InvalidRequest("empty SPARQL update".to_string()));
        }
        if self.credentials.is_none() {
            warn!(endpoint = %self.update_endpoint, "Sending SPARQL update without credentials");
        }

        let request = self.update_request(update);
        info!(method = %request.method, url = %request.url, "SPARQL update request");

        self.transport.send(request).await?.error_for_status()?;
        Ok(())
    }

    /// Execute a SELECT or ASK query and decode the JSON results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsParseError`] if the response is not SPARQL JSON results,
    /// otherwise the same errors as [`SparqlClient::update`].
    pub async fn query(&self, query: &str) -> Result<QueryResults> {
        let response = self.query_raw(query, SPARQL_RESULTS_JSON).await?;

        if let Some(content_type) = &response.content_type {
            if !content_type.contains("json") {
                return Err(Error::ResultsParseError(format!(
                    "Unsupported Content-Type returned by SPARQL endpoint: {content_type}"
                )));
            }
        }

        QueryResults::from_json(&response.body)
    }

    /// Execute an ASK query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsParseError`] if the service did not return a boolean.
    pub async fn ask(&self, query: &str) -> Result<bool> {
        self.query(query).await?.boolean().ok_or_else(|| {
            Error::ResultsParseError("expected a boolean result for ASK query".to_string())
        })
    }

    /// Execute a query and return the raw successful response, e.g. the RDF
    /// serialization produced by CONSTRUCT or DESCRIBE.
    ///
    /// # Errors
    ///
    /// Same as [`SparqlClient::query`], except for results decoding.
    pub async fn query_raw(&self, query: &str, accept: &str) -> Result<SparqlResponse> {
        if query.trim().is_empty() {
            return Err(Error::InvalidRequest("empty SPARQL query".to_string()));
        }
        self.execute_with_retry(&self.query_request(query, accept))
            .await
    }

    async fn execute_with_retry(&self, request: &SparqlRequest) -> Result<SparqlResponse> {
        let mut attempt = 0;

        loop {
            info!(method = %request.method, url = %request.url, attempt, "SPARQL query request");

            let error = match self.transport.send(request.clone()).await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => return Ok(response),
                    Err(error) => error,
                },
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }

            attempt += 1;
            if attempt > self.retry_policy.max_retries {
                return Err(error);
            }

            let delay = self.retry_policy.delay_for_attempt(attempt);
            debug!(%error, "Retrying SPARQL request after {:?}", delay);
            if delay > Duration::from_millis(0) {
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockSparqlTransport;
    use reqwest::StatusCode;

    const INSERT_TITLE: &str = "PREFIX dc: <http://purl.org/dc/elements/1.1/>\n\
        INSERT { <http://example/egbook> dc:title  \"This is an example title\" }\n\
        WHERE {}\n";

    fn location() -> RepositoryLocation {
        RepositoryLocation::new("u1", "db2", "myrepo")
    }

    fn client_with(transport: MockSparqlTransport) -> SparqlClient {
        SparqlClient::builder(location())
            .unwrap()
            .with_credentials(ApiCredentials::new("s4-key", "s4-secret"))
            .with_retry_policy(
                RetryPolicy::new()
                    .with_max_retries(2)
                    .with_initial_delay(Duration::from_millis(1)),
            )
            .with_transport(Arc::new(transport))
            .build()
            .unwrap()
    }

    fn no_content() -> SparqlResponse {
        SparqlResponse::new(StatusCode::NO_CONTENT, None, "")
    }

    fn ask_true() -> SparqlResponse {
        SparqlResponse::new(
            StatusCode::OK,
            Some(SPARQL_RESULTS_JSON),
            r#"{"head": {}, "boolean": true}"#,
        )
    }

    #[test]
    fn endpoints_follow_location() {
        let client = client_with(MockSparqlTransport::new());
        assert_eq!(
            client.update_endpoint().as_str(),
            "https://rdf.s4.ontotext.com/u1/db2/repositories/myrepo/statements"
        );
        assert_eq!(
            client.query_endpoint().as_str(),
            "https://rdf.s4.ontotext.com/u1/db2/repositories/myrepo"
        );
    }

    #[test]
    fn update_request_is_post_with_unmodified_body() {
        let client = client_with(MockSparqlTransport::new());
        let request = client.update_request(INSERT_TITLE);

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, *client.update_endpoint());
        assert_eq!(request.body.as_deref(), Some(INSERT_TITLE));
        assert_eq!(request.content_type.as_deref(), Some(SPARQL_UPDATE));
        assert_eq!(
            request.credentials.as_ref().map(ApiCredentials::api_key),
            Some("s4-key")
        );
    }

    #[test]
    fn url_encoded_update_uses_form_field() {
        let client = SparqlClient::builder(location())
            .unwrap()
            .with_update_encoding(UpdateEncoding::UrlEncoded)
            .with_transport(Arc::new(MockSparqlTransport::new()))
            .build()
            .unwrap();

        let request = client.update_request("CLEAR GRAPH <urn:g>");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.content_type.as_deref(), Some(FORM_URLENCODED));
        assert_eq!(
            request.body.as_deref(),
            Some("update=CLEAR+GRAPH+%3Curn%3Ag%3E")
        );
        assert!(request.credentials.is_none());
    }

    #[test]
    fn get_query_request_carries_query_and_options() {
        let client = SparqlClient::builder(location())
            .unwrap()
            .with_query_method(QueryMethod::Get)
            .with_query_options(QueryOptions {
                infer: Some(false),
                ..QueryOptions::default()
            })
            .with_transport(Arc::new(MockSparqlTransport::new()))
            .build()
            .unwrap();

        let request = client.query_request("ASK {}", SPARQL_RESULTS_JSON);
        assert_eq!(request.method, Method::GET);
        assert!(request.body.is_none());
        assert_eq!(request.accept.as_deref(), Some(SPARQL_RESULTS_JSON));
        assert_eq!(request.url.query(), Some("query=ASK+%7B%7D&infer=false"));
    }

    #[tokio::test]
    async fn update_sends_credentials_exactly_once() {
        let mut transport = MockSparqlTransport::new();
        transport
            .expect_send()
            .withf(|request| {
                request.method == Method::POST
                    && request.body.as_deref() == Some(INSERT_TITLE)
                    && request.credentials.as_ref().is_some_and(|credentials| {
                        credentials.api_key() == "s4-key" && credentials.key_secret() == "s4-secret"
                    })
            })
            .times(1)
            .returning(|_| Ok(no_content()));

        client_with(transport).update(INSERT_TITLE).await.unwrap();
    }

    #[tokio::test]
    async fn update_is_not_retried() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(SparqlResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                Some("text/plain"),
                "maintenance",
            ))
        });

        let err = client_with(transport).update(INSERT_TITLE).await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn update_surfaces_transport_errors() {
        let mut transport = MockSparqlTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(Error::Timeout("deadline elapsed".to_string())));

        let err = client_with(transport).update(INSERT_TITLE).await.unwrap_err();
        assert_eq!(err, Error::Timeout("deadline elapsed".to_string()));
    }

    #[tokio::test]
    async fn blank_update_is_rejected_before_sending() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().never();

        let err = client_with(transport).update("  \n").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn query_retries_transient_failures() {
        let mut transport = MockSparqlTransport::new();
        let mut sequence = mockall::Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Err(Error::ServiceUnavailable("connection refused".to_string())));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(ask_true()));

        assert!(client_with(transport).ask("ASK {}").await.unwrap());
    }

    #[tokio::test]
    async fn query_does_not_retry_unexpected_status() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(SparqlResponse::new(
                StatusCode::NOT_ACCEPTABLE,
                Some("text/plain"),
                "No acceptable file format found",
            ))
        });

        let err = client_with(transport)
            .query_raw("CONSTRUCT WHERE { ?s ?p ?o }", "text/x-unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpError(_)));
    }

    #[tokio::test]
    async fn query_does_not_retry_broken_redirect() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Err(Error::HttpError(
                "Redirect 302 Found without a Location header".to_string(),
            ))
        });

        let err = client_with(transport).ask("ASK {}").await.unwrap_err();
        assert!(matches!(err, Error::HttpError(_)));
    }

    #[tokio::test]
    async fn query_gives_up_after_max_retries() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(3).returning(|_| {
            Ok(SparqlResponse::new(StatusCode::BAD_GATEWAY, None, "upstream"))
        });

        let err = client_with(transport).query("ASK {}").await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn query_does_not_retry_client_errors() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(SparqlResponse::new(
                StatusCode::BAD_REQUEST,
                Some("text/plain"),
                "MALFORMED QUERY: Lexical error",
            ))
        });

        let err = client_with(transport).query("SELEC *").await.unwrap_err();
        assert_eq!(
            err,
            Error::BadRequest("MALFORMED QUERY: Lexical error".to_string())
        );
    }

    #[tokio::test]
    async fn query_rejects_non_json_results() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(SparqlResponse::new(
                StatusCode::OK,
                Some("application/sparql-results+xml"),
                "<sparql/>",
            ))
        });

        let err = client_with(transport).query("ASK {}").await.unwrap_err();
        assert!(matches!(err, Error::ResultsParseError(_)));
    }

    #[tokio::test]
    async fn ask_requires_boolean_results() {
        let mut transport = MockSparqlTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Ok(SparqlResponse::new(
                StatusCode::OK,
                Some(SPARQL_RESULTS_JSON),
                r#"{"head": {"vars": []}, "results": {"bindings": []}}"#,
            ))
        });

        let err = client_with(transport).ask("SELECT * {}").await.unwrap_err();
        assert!(matches!(err, Error::ResultsParseError(_)));
    }

    #[test]
    fn from_config_uses_credentials_and_location() {
        let config = S4ClientConfig::new(&location(), &ApiCredentials::new("key", "secret"))
            .unwrap()
            .with_max_retries(0);
        let builder = SparqlClientBuilder::from_config(&config)
            .unwrap()
            .with_transport(Arc::new(MockSparqlTransport::new()));
        let client = builder.build().unwrap();

        assert_eq!(client.retry_policy.max_retries, 0);
        assert_eq!(
            client
                .update_request("CLEAR DEFAULT")
                .credentials
                .as_ref()
                .map(ApiCredentials::key_secret),
            Some("secret")
        );
    }

    #[test]
    fn from_templates_renders_both_endpoints() {
        let builder = SparqlClientBuilder::from_templates(
            &EndpointTemplate::repository(),
            &EndpointTemplate::statements(),
            &location(),
        )
        .unwrap();
        assert_eq!(
            builder.update_endpoint.as_str(),
            "https://rdf.s4.ontotext.com/u1/db2/repositories/myrepo/statements"
        );
        assert!(SparqlClientBuilder::from_urls("not a url", "http://x/statements").is_err());
    }
}
