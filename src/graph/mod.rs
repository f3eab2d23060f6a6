//! Graph access: the connection and its two interchangeable backends.
//!
//! - **Remote** ([`remote::RemoteEndpoint`]): SPARQL 1.1 protocol over HTTP (`ureq`)
//! - **Local** ([`local::LocalGraph`]): `oxigraph` store, in memory or on disk,
//!   optionally preloaded from a static RDF file
//!
//! Callers only ever see [`GraphConnection`] and untyped [`Binding`] rows; the
//! query layer decodes rows into typed structs.

pub mod connection;
pub mod local;
pub mod remote;

use std::collections::HashMap;

pub use connection::{Backend, GraphConnection, RetryPolicy};

/// One result row: variable name to lexical value (IRI text or literal form).
pub type Binding = HashMap<String, String>;
