//! SPARQL protocol options and the SPARQL 1.1 JSON results model.

use s4_core::query::QueryParams;
use s4_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Media type of a SPARQL 1.1 update sent directly in the request body.
pub const SPARQL_UPDATE: &str = "application/sparql-update";
/// Media type of a SPARQL 1.1 query sent directly in the request body.
pub const SPARQL_QUERY: &str = "application/sparql-query";
/// Media type of URL-encoded form bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// Media type of SPARQL 1.1 JSON results.
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// How an update is placed in the POST request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateEncoding {
    /// Raw update text as an `application/sparql-update` body.
    #[default]
    Direct,
    /// `update=<text>` as an `application/x-www-form-urlencoded` body.
    UrlEncoded,
}

/// How a query is sent to the repository endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMethod {
    /// Raw query text as an `application/sparql-query` POST body.
    #[default]
    Post,
    /// Query text in the `query` URL parameter of a GET request.
    Get,
}

/// Optional protocol parameters attached to queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Whether inferred statements are included (`infer`).
    pub infer: Option<bool>,
    /// Server-side evaluation timeout in seconds (`timeout`).
    pub timeout_secs: Option<u32>,
    /// Default graph IRIs (`default-graph-uri`).
    pub default_graphs: Vec<String>,
    /// Named graph IRIs (`named-graph-uri`).
    pub named_graphs: Vec<String>,
}

impl QueryOptions {
    /// Convert the options to URL parameter pairs.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_opt("infer", self.infer);
        params.push_opt("timeout", self.timeout_secs);
        params.push_each("default-graph-uri", &self.default_graphs);
        params.push_each("named-graph-uri", &self.named_graphs);
        params
    }
}

/// An RDF term bound in a query solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    /// IRI.
    Uri {
        /// The IRI.
        value: String,
    },
    /// Literal, optionally language-tagged or typed.
    #[serde(alias = "typed-literal")]
    Literal {
        /// Lexical form.
        value: String,
        /// Datatype IRI.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        /// Language tag.
        #[serde(default, rename = "xml:lang", skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
    /// Blank node.
    Bnode {
        /// Blank node label.
        value: String,
    },
    /// RDF-star quoted triple.
    Triple {
        /// The quoted triple.
        value: Box<TripleTerm>,
    },
}

/// Components of an RDF-star quoted triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleTerm {
    /// Subject.
    pub subject: Term,
    /// Predicate.
    pub predicate: Term,
    /// Object.
    pub object: Term,
}

impl Term {
    /// Lexical value of IRIs, literals and blank nodes; `None` for quoted triples.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Uri { value } | Self::Literal { value, .. } | Self::Bnode { value } => {
                Some(value.as_str())
            }
            Self::Triple { .. } => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri { value } => write!(f, "<{value}>"),
            Self::Bnode { value } => write!(f, "_:{value}"),
            Self::Literal {
                value,
                datatype,
                lang,
            } => {
                f.write_str("\"")?;
                for c in value.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")?;
                if let Some(lang) = lang {
                    write!(f, "@{lang}")
                } else if let Some(datatype) = datatype {
                    write!(f, "^^<{datatype}>")
                } else {
                    Ok(())
                }
            }
            Self::Triple { value } => write!(
                f,
                "<< {} {} {} >>",
                value.subject, value.predicate, value.object
            ),
        }
    }
}

/// One query solution: variable name to bound term. Unbound variables are absent.
pub type Solution = HashMap<String, Term>;

/// Result of a SELECT query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solutions {
    /// Projected variables, in order.
    pub variables: Vec<String>,
    /// Solutions in the order returned by the service.
    pub bindings: Vec<Solution>,
}

impl Solutions {
    /// Number of solutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true when no solution was returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Term bound to `variable` in the solution at `row`.
    #[must_use]
    pub fn get(&self, row: usize, variable: &str) -> Option<&Term> {
        self.bindings.get(row).and_then(|solution| solution.get(variable))
    }

    /// Terms bound to `variable`, one entry per solution.
    pub fn column<'a>(&'a self, variable: &'a str) -> impl Iterator<Item = Option<&'a Term>> + 'a {
        self.bindings.iter().map(move |solution| solution.get(variable))
    }
}

/// Decoded SPARQL 1.1 JSON results document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResults {
    /// SELECT results.
    Solutions(Solutions),
    /// ASK result.
    Boolean(bool),
}

#[derive(Deserialize)]
struct RawResults {
    #[serde(default)]
    head: RawHead,
    #[serde(default)]
    results: Option<RawBindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Default, Deserialize)]
struct RawHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Deserialize)]
struct RawBindings {
    bindings: Vec<Solution>,
}

impl QueryResults {
    /// Decode a `application/sparql-results+json` document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResultsParseError`] if the document is not valid JSON results.
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawResults = serde_json::from_str(body)?;
        match (raw.boolean, raw.results) {
            (Some(value), _) => Ok(Self::Boolean(value)),
            (None, Some(results)) => Ok(Self::Solutions(Solutions {
                variables: raw.head.vars,
                bindings: results.bindings,
            })),
            (None, None) => Err(Error::ResultsParseError(
                "document has neither `results` nor `boolean`".to_string(),
            )),
        }
    }

    /// The solutions of a SELECT query, if this is one.
    #[must_use]
    pub fn solutions(&self) -> Option<&Solutions> {
        match self {
            Self::Solutions(solutions) => Some(solutions),
            Self::Boolean(_) => None,
        }
    }

    /// The answer of an ASK query, if this is one.
    #[must_use]
    pub const fn boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::Solutions(_) => None,
        }
    }
}
