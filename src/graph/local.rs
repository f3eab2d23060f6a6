//! Local RDF graph backed by oxigraph.
//!
//! Serves as the second interchangeable backend of the connection: either an
//! in-memory store (optionally preloaded from a static RDF file for read-only
//! inspection) or a persistent on-disk store.

use std::path::Path;

use oxigraph::io::RdfFormat;
use oxigraph::model::{GraphName, Quad, Term, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::{ConnectionError, ConnectionResult};

use super::Binding;

/// oxigraph-backed graph.
pub struct LocalGraph {
    store: Store,
}

impl LocalGraph {
    /// Create a new in-memory graph (no persistence).
    pub fn in_memory() -> ConnectionResult<Self> {
        let store = Store::new().map_err(|e| ConnectionError::Store {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self { store })
    }

    /// Open or create a persistent graph at the given directory.
    pub fn open(path: &Path) -> ConnectionResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| ConnectionError::Store {
            message: format!("failed to create graph directory {}: {e}", path.display()),
        })?;
        let store = Store::open(path).map_err(|e| ConnectionError::Store {
            message: format!("failed to open oxigraph store at {}: {e}", path.display()),
        })?;
        Ok(Self { store })
    }

    /// Load a static graph file into a fresh in-memory store.
    ///
    /// The serialization is picked from the file extension (`ttl`, `nt`,
    /// `owl`/`rdf`, ...).
    pub fn from_file(path: &Path) -> ConnectionResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let format = match ext.as_str() {
            "owl" | "xml" => Some(RdfFormat::RdfXml),
            other => RdfFormat::from_extension(other),
        }
        .ok_or_else(|| ConnectionError::Store {
            message: format!("unsupported graph file extension: {}", path.display()),
        })?;

        let file = std::fs::File::open(path).map_err(|e| ConnectionError::Store {
            message: format!("failed to open {}: {e}", path.display()),
        })?;
        let graph = Self::in_memory()?;
        graph
            .store
            .load_from_reader(format, std::io::BufReader::new(file))
            .map_err(|e| ConnectionError::Store {
                message: format!("failed to load {}: {e}", path.display()),
            })?;
        tracing::info!(path = %path.display(), triples = graph.len()?, "loaded static graph");
        Ok(graph)
    }

    /// Execute a SELECT query and return one binding map per solution.
    pub fn select(&self, sparql: &str) -> ConnectionResult<Vec<Binding>> {
        let results = self.store.query(sparql).map_err(|e| ConnectionError::Store {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| ConnectionError::Store {
                        message: format!("solution error: {e}"),
                    })?;
                    let mut row = Binding::new();
                    for (var, term) in solution.iter() {
                        row.insert(var.as_str().to_string(), term_value(term));
                    }
                    rows.push(row);
                }
                Ok(rows)
            }
            _ => Err(ConnectionError::Store {
                message: "only SELECT queries are supported".into(),
            }),
        }
    }

    /// Insert triples into the default graph.
    pub fn insert(&self, triples: &[Triple]) -> ConnectionResult<()> {
        for triple in triples {
            self.store
                .insert(&in_default_graph(triple))
                .map_err(|e| ConnectionError::Store {
                    message: format!("insert failed: {e}"),
                })?;
        }
        Ok(())
    }

    /// Remove one triple. Returns whether it was present.
    pub fn remove(&self, triple: &Triple) -> ConnectionResult<bool> {
        self.store
            .remove(&in_default_graph(triple))
            .map_err(|e| ConnectionError::Store {
                message: format!("remove failed: {e}"),
            })
    }

    /// Number of triples in the store.
    pub fn len(&self) -> ConnectionResult<usize> {
        self.store.len().map_err(|e| ConnectionError::Store {
            message: format!("count failed: {e}"),
        })
    }

    pub fn is_empty(&self) -> ConnectionResult<bool> {
        self.len().map(|n| n == 0)
    }
}

impl std::fmt::Debug for LocalGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGraph").finish()
    }
}

fn in_default_graph(triple: &Triple) -> Quad {
    Quad::new(
        triple.subject.clone(),
        triple.predicate.clone(),
        triple.object.clone(),
        GraphName::DefaultGraph,
    )
}

/// String value of a bound term: IRI text, literal lexical form, or `_:id`.
fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => n.as_str().to_string(),
        Term::Literal(l) => l.value().to_string(),
        Term::BlankNode(b) => format!("_:{}", b.as_str()),
        #[allow(unreachable_patterns)]
        other => other.to_string(),
    }
}
