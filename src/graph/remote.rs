//! HTTP backend speaking the SPARQL 1.1 protocol to a remote triple store.
//!
//! Three endpoints hang off the configured dataset URL:
//!
//! - `/query`  – SELECT statements, answered with a `results.bindings` JSON document
//! - `/data`   – bulk upload of an N-Triples document into the default graph
//! - `/update` – one `DELETE DATA` statement per request
//!
//! Requests block the calling thread; the only timeout is the optional one
//! from the config.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConnectionError, ConnectionResult};

use super::Binding;

/// SPARQL JSON result document (`application/sparql-results+json`).
#[derive(Debug, Deserialize)]
pub(crate) struct ResultDocument {
    results: ResultSet,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    bindings: Vec<HashMap<String, BoundTerm>>,
}

/// Only the lexical value is kept; `type` and `datatype` are implied by the
/// query that produced the row.
#[derive(Debug, Deserialize)]
struct BoundTerm {
    value: String,
}

impl ResultDocument {
    pub(crate) fn into_bindings(self) -> Vec<Binding> {
        self.results
            .bindings
            .into_iter()
            .map(|row| row.into_iter().map(|(var, t)| (var, t.value)).collect())
            .collect()
    }
}

/// Connection to a remote dataset.
pub struct RemoteEndpoint {
    base_url: String,
    http: ureq::Agent,
}

impl RemoteEndpoint {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: builder.build(),
        }
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    pub fn data_url(&self) -> String {
        format!("{}/data", self.base_url)
    }

    pub fn update_url(&self) -> String {
        format!("{}/update", self.base_url)
    }

    /// Run a SELECT statement.
    pub fn select(&self, sparql: &str) -> ConnectionResult<Vec<Binding>> {
        let url = self.query_url();
        let resp = self
            .http
            .post(&url)
            .set("Content-Type", "application/sparql-query")
            .set("Accept", "application/sparql-results+json")
            .send_string(sparql)
            .map_err(|e| request_error(&url, e))?;
        let doc: ResultDocument = resp.into_json().map_err(|e| ConnectionError::Decode {
            endpoint: url.clone(),
            message: e.to_string(),
        })?;
        Ok(doc.into_bindings())
    }

    /// Upload an N-Triples document in one request.
    pub fn upload(&self, ntriples: &str) -> ConnectionResult<()> {
        let url = self.data_url();
        self.http
            .post(&url)
            .set("Content-Type", "application/n-triples")
            .send_string(ntriples)
            .map_err(|e| request_error(&url, e))?;
        Ok(())
    }

    /// Send a single update statement.
    pub fn update(&self, statement: &str) -> ConnectionResult<()> {
        let url = self.update_url();
        self.http
            .post(&url)
            .set("Content-Type", "application/sparql-update")
            .send_string(statement)
            .map_err(|e| request_error(&url, e))?;
        Ok(())
    }
}

impl std::fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn request_error(endpoint: &str, err: ureq::Error) -> ConnectionError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            tracing::warn!(endpoint, status, "triple store rejected request");
            ConnectionError::Status {
                endpoint: endpoint.to_string(),
                status,
                body,
            }
        }
        ureq::Error::Transport(t) => {
            tracing::warn!(endpoint, error = %t, "transport failure");
            ConnectionError::Transport {
                endpoint: endpoint.to_string(),
                message: t.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_result_bindings() {
        let json = r#"{
            "head": { "vars": ["id", "name"] },
            "results": { "bindings": [
                { "id":   { "type": "uri", "value": "http://x#comp_1" },
                  "name": { "type": "literal", "value": "Lambda sensor" } },
                { "id":   { "type": "uri", "value": "http://x#comp_2" } }
            ] }
        }"#;
        let doc: ResultDocument = serde_json::from_str(json).unwrap();
        let rows = doc.into_bindings();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Lambda sensor");
        assert!(!rows[1].contains_key("name"));
    }

    #[test]
    fn typed_literals_keep_lexical_value() {
        let json = r#"{"head":{"vars":["p"]},"results":{"bindings":[
            {"p":{"type":"literal","datatype":"http://www.w3.org/2001/XMLSchema#integer","value":"3"}}
        ]}}"#;
        let doc: ResultDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.into_bindings()[0]["p"], "3");
    }

    #[test]
    fn endpoint_urls_hang_off_base() {
        let remote = RemoteEndpoint::new("http://localhost:3030/OBD/", None);
        assert_eq!(remote.query_url(), "http://localhost:3030/OBD/query");
        assert_eq!(remote.data_url(), "http://localhost:3030/OBD/data");
        assert_eq!(remote.update_url(), "http://localhost:3030/OBD/update");
    }
}
