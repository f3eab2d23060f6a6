//! Rich diagnostic error types for the OBD knowledge client.
//!
//! Each layer defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so operators know exactly
//! what went wrong against the remote store and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the knowledge client.
///
/// Each variant wraps a layer-specific error, preserving the full diagnostic
/// chain through to the caller (form layer, CLI, ingestion script).
#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Enhance(#[from] EnhanceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("{entity} \"{key}\" was partially applied: {stage}")]
    #[diagnostic(
        code(obd::kb::partial_application),
        help(
            "Superseded facts were retracted but the new version could not be \
             written. The entity is now missing some of its facts. Publish the \
             record again once the store is reachable; the retraction step is \
             recomputed from the current graph state."
        )
    )]
    PartialApplication {
        entity: String,
        key: String,
        stage: String,
        #[source]
        source: Box<KbError>,
    },
}

// ---------------------------------------------------------------------------
// Connection errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConnectionError {
    #[error("{endpoint} returned HTTP {status}: {body}")]
    #[diagnostic(
        code(obd::connection::status),
        help(
            "The triple store rejected the request. Check that the dataset exists \
             under the configured base URL and that the statement is valid SPARQL."
        )
    )]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("transport failure talking to {endpoint}: {message}")]
    #[diagnostic(
        code(obd::connection::transport),
        help("Is the triple store running and reachable at the configured base URL?")
    )]
    Transport { endpoint: String, message: String },

    #[error("could not decode response from {endpoint}: {message}")]
    #[diagnostic(
        code(obd::connection::decode),
        help("The store answered with something other than a SPARQL JSON result document.")
    )]
    Decode { endpoint: String, message: String },

    #[error("invalid IRI \"{iri}\": {message}")]
    #[diagnostic(
        code(obd::connection::iri),
        help("Identifiers and predicates must form valid IRIs once namespaced.")
    )]
    Iri { iri: String, message: String },

    #[error("local graph error: {message}")]
    #[diagnostic(
        code(obd::connection::store),
        help(
            "The local oxigraph store failed. Check the graph file or directory \
             configured for the local backend."
        )
    )]
    Store { message: String },

    #[error("retraction stopped after {applied} of {total} facts")]
    #[diagnostic(
        code(obd::connection::partial_retraction),
        help(
            "Deletes are issued one statement per fact and are not retried. \
             The graph is partially retracted; recompute the retraction set from \
             the current state before trying again."
        )
    )]
    PartialRetraction {
        applied: usize,
        total: usize,
        #[source]
        source: Box<ConnectionError>,
    },
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("expected at most one {what} for \"{key}\", found {count}")]
    #[diagnostic(
        code(obd::query::ambiguous),
        help(
            "The graph holds several nodes for a key that must be unique. \
             This is a data-integrity problem; merge or retract the duplicates \
             before publishing again."
        )
    )]
    AmbiguousMatch {
        what: String,
        key: String,
        count: usize,
    },

    #[error("result row is missing or has a malformed `{variable}`: {message}")]
    #[diagnostic(
        code(obd::query::decode),
        help("The query result does not match the expected row shape.")
    )]
    Decode { variable: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Connection(#[from] ConnectionError),
}

// ---------------------------------------------------------------------------
// Enhancer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EnhanceError {
    #[error("{relation} target {target_type} \"{target}\" does not exist")]
    #[diagnostic(
        code(obd::enhance::integrity_violation),
        help(
            "Relations may only point at entities that are already in the graph. \
             Publish the referenced {target_type} first, then retry."
        )
    )]
    IntegrityViolation {
        relation: String,
        target_type: String,
        target: String,
    },

    #[error("{field}[{index}] is {value}, only finite numbers can be stored")]
    #[diagnostic(
        code(obd::enhance::non_finite),
        help("Series are stored as JSON arrays, which cannot hold NaN or infinity.")
    )]
    NonFinite {
        field: String,
        index: usize,
        value: f64,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),
}

impl From<ConnectionError> for EnhanceError {
    fn from(e: ConnectionError) -> Self {
        EnhanceError::Query(QueryError::Connection(e))
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(obd::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(obd::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(obd::config::invalid), help("Check the KbConfig fields. {message}"))]
    Invalid { message: String },
}

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;
pub type QueryResult<T> = std::result::Result<T, QueryError>;
pub type EnhanceResult<T> = std::result::Result<T, EnhanceError>;

/// Convenience alias for functions returning knowledge-client results.
pub type KbResult<T> = std::result::Result<T, KbError>;

impl ConnectionError {
    /// Whether the failure happened before the store applied anything, so the
    /// same request can be sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectionError::Transport { .. } => true,
            ConnectionError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_converts_through_query_error() {
        let err = ConnectionError::Transport {
            endpoint: "http://localhost:3030/OBD/query".into(),
            message: "connection refused".into(),
        };
        let kb: KbError = QueryError::from(err).into();
        assert!(matches!(
            kb,
            KbError::Query(QueryError::Connection(ConnectionError::Transport { .. }))
        ));
    }

    #[test]
    fn enhance_error_wraps_connection_error() {
        let err = ConnectionError::Store {
            message: "boom".into(),
        };
        let enhance: EnhanceError = err.into();
        assert!(matches!(
            enhance,
            EnhanceError::Query(QueryError::Connection(ConnectionError::Store { .. }))
        ));
    }

    #[test]
    fn only_transport_and_server_errors_retry() {
        let transport = ConnectionError::Transport {
            endpoint: "e".into(),
            message: "reset".into(),
        };
        let server = ConnectionError::Status {
            endpoint: "e".into(),
            status: 503,
            body: String::new(),
        };
        let client = ConnectionError::Status {
            endpoint: "e".into(),
            status: 400,
            body: "parse error".into(),
        };
        assert!(transport.is_retryable());
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn integrity_violation_message_names_target() {
        let err = EnhanceError::IntegrityViolation {
            relation: "affected_by".into(),
            target_type: "SuspectComponent".into(),
            target: "Sensor9".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("affected_by"));
        assert!(msg.contains("Sensor9"));
    }
}
