//! Backend-agnostic bridge between in-memory [`Fact`]s and the triple store.
//!
//! `GraphConnection` wraps either a remote SPARQL endpoint or a local
//! oxigraph graph. It owns namespace resolution, fact-to-RDF translation, and
//! the retry policy: reads and bulk inserts are retried on transport failure,
//! per-fact deletes never are.

use std::time::Duration;

use oxigraph::model::{Literal, NamedNode, Term, Triple};

use crate::config::KbConfig;
use crate::error::{ConnectionError, ConnectionResult};
use crate::fact::{Datatype, Fact, FactObject};
use crate::vocab::Namespace;

use super::Binding;
use super::local::LocalGraph;
use super::remote::RemoteEndpoint;

/// Where statements are sent.
pub enum Backend {
    /// HTTP SPARQL protocol endpoint.
    Remote(RemoteEndpoint),
    /// In-process oxigraph store.
    Local(LocalGraph),
}

/// Bounded retry for idempotent operations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        backoff: Duration::ZERO,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Network (or in-process) bridge to the graph.
pub struct GraphConnection {
    backend: Backend,
    namespace: Namespace,
    retry: RetryPolicy,
}

impl GraphConnection {
    pub fn new(backend: Backend, namespace: Namespace, retry: RetryPolicy) -> Self {
        Self {
            backend,
            namespace,
            retry,
        }
    }

    /// Pick the backend the config asks for: a static graph file, a
    /// persistent local directory, or the remote endpoint.
    pub fn from_config(config: &KbConfig) -> ConnectionResult<Self> {
        let backend = if let Some(ref file) = config.graph_file {
            Backend::Local(LocalGraph::from_file(file)?)
        } else if let Some(ref dir) = config.graph_dir {
            Backend::Local(LocalGraph::open(dir)?)
        } else {
            Backend::Remote(RemoteEndpoint::new(
                config.endpoint_base(),
                config.timeout_secs.map(Duration::from_secs),
            ))
        };
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        };
        Ok(Self::new(
            backend,
            Namespace::new(config.namespace.clone()),
            retry,
        ))
    }

    /// Empty in-memory local graph under the given namespace.
    pub fn in_memory(namespace: Namespace) -> ConnectionResult<Self> {
        Ok(Self::new(
            Backend::Local(LocalGraph::in_memory()?),
            namespace,
            RetryPolicy::NONE,
        ))
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote(_))
    }

    /// Run a read-only SELECT statement.
    pub fn query(&self, sparql: &str) -> ConnectionResult<Vec<Binding>> {
        tracing::debug!(sparql, "select");
        self.with_retry("query", || match &self.backend {
            Backend::Remote(remote) => remote.select(sparql),
            Backend::Local(local) => local.select(sparql),
        })
    }

    /// Write all facts as one bulk upload.
    ///
    /// Only as atomic as the store makes a single upload; nothing spans calls.
    pub fn insert(&self, facts: &[Fact]) -> ConnectionResult<()> {
        if facts.is_empty() {
            return Ok(());
        }
        let triples = facts
            .iter()
            .map(|f| self.to_triple(f))
            .collect::<ConnectionResult<Vec<_>>>()?;
        tracing::debug!(count = triples.len(), "insert");

        match &self.backend {
            Backend::Remote(remote) => {
                let body = ntriples(&triples);
                self.with_retry("insert", || remote.upload(&body))
            }
            Backend::Local(local) => local.insert(&triples),
        }
    }

    /// Retract facts, one statement per fact.
    ///
    /// A statement that matches nothing is a silent no-op. On the first
    /// failure the error reports how many facts were already retracted.
    pub fn delete(&self, facts: &[Fact]) -> ConnectionResult<usize> {
        let total = facts.len();
        for (applied, fact) in facts.iter().enumerate() {
            if let Err(e) = self.delete_one(fact) {
                tracing::error!(applied, total, fact = %fact, "retraction interrupted");
                return Err(ConnectionError::PartialRetraction {
                    applied,
                    total,
                    source: Box::new(e),
                });
            }
        }
        tracing::debug!(count = total, "delete");
        Ok(total)
    }

    fn delete_one(&self, fact: &Fact) -> ConnectionResult<()> {
        let triple = self.to_triple(fact)?;
        match &self.backend {
            Backend::Remote(remote) => remote.update(&format!("DELETE DATA {{ {triple} . }}")),
            Backend::Local(local) => local.remove(&triple).map(|_| ()),
        }
    }

    /// Translate a fact into an RDF triple under this connection's namespace.
    pub fn to_triple(&self, fact: &Fact) -> ConnectionResult<Triple> {
        let subject = self.named_node(&fact.subject)?;
        let predicate = self.named_node(&fact.predicate)?;
        let object: Term = match &fact.object {
            FactObject::Resource(o) => self.named_node(o)?.into(),
            FactObject::Literal { value, datatype } => literal(value, datatype)?.into(),
        };
        Ok(Triple::new(subject, predicate, object))
    }

    fn named_node(&self, term: &str) -> ConnectionResult<NamedNode> {
        let iri = self.namespace.resolve(term);
        NamedNode::new(iri.clone()).map_err(|e| ConnectionError::Iri {
            iri,
            message: e.to_string(),
        })
    }

    fn with_retry<T>(
        &self,
        op: &str,
        mut f: impl FnMut() -> ConnectionResult<T>,
    ) -> ConnectionResult<T> {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, error = %e, "retrying after transport failure");
                    std::thread::sleep(self.retry.backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for GraphConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Remote(r) => format!("{r:?}"),
            Backend::Local(_) => "LocalGraph".to_string(),
        };
        f.debug_struct("GraphConnection")
            .field("backend", &backend)
            .field("namespace", &self.namespace.prefix())
            .finish()
    }
}

fn literal(value: &str, datatype: &Datatype) -> ConnectionResult<Literal> {
    if let Datatype::Language(tag) = datatype {
        return Literal::new_language_tagged_literal(value, tag.as_str()).map_err(|e| {
            ConnectionError::Iri {
                iri: format!("@{tag}"),
                message: e.to_string(),
            }
        });
    }
    match datatype.iri() {
        None => Ok(Literal::new_simple_literal(value)),
        Some(dt) => {
            let dt_node = NamedNode::new(dt.clone()).map_err(|e| ConnectionError::Iri {
                iri: dt,
                message: e.to_string(),
            })?;
            Ok(Literal::new_typed_literal(value, dt_node))
        }
    }
}

/// Serialize triples as an N-Triples document.
fn ntriples(triples: &[Triple]) -> String {
    let mut body = String::new();
    for t in triples {
        body.push_str(&t.to_string());
        body.push_str(" .\n");
    }
    body
}
