//! HTTP transport used by [`SparqlClient`](crate::SparqlClient).
//!
//! The client builds a [`SparqlRequest`] and hands it to a [`SparqlTransport`]; the
//! production implementation is [`HttpTransport`], backed by `reqwest`. Keeping the
//! seam as a trait lets callers plug in their own HTTP stack and lets tests inspect
//! exactly what would go over the wire.

use crate::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Method, StatusCode};
use s4_core::client::{ClientConfig, MAX_REDIRECTS};
use s4_core::error::error_message;
use s4_core::{ApiCredentials, Error};
use tracing::{debug, warn};
use url::Url;

/// User agent sent by [`HttpTransport`].
pub const USER_AGENT: &str = concat!("s4-sparql/", env!("CARGO_PKG_VERSION"));

/// A single SPARQL protocol request, ready to be sent.
#[derive(Debug, Clone)]
pub struct SparqlRequest {
    /// HTTP method.
    pub method: Method,
    /// Target URL, including any query-string parameters.
    pub url: Url,
    /// `Accept` header value.
    pub accept: Option<String>,
    /// `Content-Type` header value of the body.
    pub content_type: Option<String>,
    /// Request body.
    pub body: Option<String>,
    /// Credentials sent as HTTP basic authentication.
    pub credentials: Option<ApiCredentials>,
}

impl SparqlRequest {
    /// Create a request without headers or body.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            accept: None,
            content_type: None,
            body: None,
            credentials: None,
        }
    }

    /// Attach a body with its media type.
    #[must_use]
    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Set the `Accept` header.
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Attach credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<ApiCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// The request to issue after the service answered with a redirect.
    ///
    /// `303 See Other` switches to a bodiless `GET`; other redirects repeat the
    /// method and body. Credentials are kept on every hop unless the redirect leaves
    /// `https`, so the key pair is never sent in cleartext.
    #[must_use]
    pub fn redirected(mut self, status: StatusCode, location: Url) -> Self {
        if status == StatusCode::SEE_OTHER {
            self.method = Method::GET;
            self.content_type = None;
            self.body = None;
        }
        let downgrade = self.url.scheme() == "https" && location.scheme() != "https";
        if downgrade && self.credentials.is_some() {
            warn!(to = %location, "Dropping credentials on redirect away from https");
            self.credentials = None;
        }
        self.url = location;
        self
    }
}

/// A response as seen by the client: status, media type and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// `Content-Type` header value.
    pub content_type: Option<String>,
    /// Decoded body text.
    pub body: String,
}

impl SparqlResponse {
    /// Create a response.
    #[must_use]
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Pass successful responses through and turn the others into an [`Error`].
    ///
    /// # Errors
    ///
    /// Returns the error matching the status code, carrying the service's message.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            let message = error_message(self.content_type.as_deref(), &self.body);
            Err(Error::from_status("SPARQL", self.status, message))
        }
    }
}

/// Sends SPARQL requests over HTTP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SparqlTransport: Send + Sync {
    /// Send the request once and return the final response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    async fn send(&self, request: SparqlRequest) -> Result<SparqlResponse>;
}

/// [`SparqlTransport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Build a transport from HTTP client settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if !config.tls_verify {
            warn!("TLS verification disabled for SPARQL transport");
        }
        let http = config.build_http_client(USER_AGENT)?;
        Ok(Self { http })
    }

    /// Wrap an existing `reqwest` client.
    ///
    /// The client should not follow redirects itself, or credentials may be dropped
    /// on cross-host hops.
    #[must_use]
    pub const fn from_client(http: Client) -> Self {
        Self { http }
    }

    async fn dispatch(&self, request: &SparqlRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone());

        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(credentials.api_key(), Some(credentials.key_secret()));
        }
        if let Some(body) = &request.body {
            if let Some(content_type) = &request.content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = builder.body(body.clone());
        }

        builder.send().await.map_err(Error::from)
    }
}

#[async_trait]
impl SparqlTransport for HttpTransport {
    async fn send(&self, request: SparqlRequest) -> Result<SparqlResponse> {
        let mut request = request;

        for _ in 0..=MAX_REDIRECTS {
            let response = self.dispatch(&request).await?;
            let status = response.status();

            if status.is_redirection() && status != StatusCode::NOT_MODIFIED {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        Error::HttpError(format!(
                            "Redirect {status} from {} without a Location header",
                            request.url
                        ))
                    })?;
                let next = request.url.join(location).map_err(|err| {
                    Error::InvalidEndpoint(format!("Invalid redirect target `{location}`: {err}"))
                })?;

                debug!(from = %request.url, to = %next, %status, "Following redirect");
                request = request.redirected(status, next);
                continue;
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.map_err(Error::from)?;

            return Ok(SparqlResponse {
                status,
                content_type,
                body,
            });
        }

        Err(Error::InvalidRequest(format!(
            "More than {MAX_REDIRECTS} redirects for {}",
            request.url
        )))
    }
}
