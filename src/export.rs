//! Export types for dumping the knowledge graph.
//!
//! These provide a key-resolved, JSON-friendly view of every entity and
//! statement, for backups and for diffing two stores.

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::ident::EntityId;
use crate::query::rows::{EntityKeyRow, TripleRow};
use crate::query::GraphQueryTool;
use crate::vocab::EntityType;

/// Exported entity with its natural key resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityExport {
    /// Local name of the node.
    pub id: EntityId,
    pub entity_type: EntityType,
    /// Natural key, for types that have one.
    pub key: Option<String>,
}

/// Full graph dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    /// Namespace local names are relative to.
    pub namespace: String,
    /// Entities grouped by type, keyed types sorted by key.
    pub entities: Vec<EntityExport>,
    pub statements: Vec<TripleRow>,
}

impl GraphExport {
    /// Read the whole graph through `query`.
    pub fn collect(query: &GraphQueryTool) -> QueryResult<Self> {
        let mut entities = Vec::new();
        for entity_type in EntityType::ALL {
            match entity_type.natural_key() {
                Some(key_pred) => {
                    let mut rows: Vec<EntityKeyRow> = query.rows(&format!(
                        "SELECT ?id ?key WHERE {{ ?id rdf:type obd:{} ; obd:{key_pred} ?key }}",
                        entity_type.class_name()
                    ))?;
                    rows.sort_by(|a, b| a.key.cmp(&b.key));
                    entities.extend(rows.into_iter().map(|r| EntityExport {
                        id: r.id,
                        entity_type,
                        key: Some(r.key),
                    }));
                }
                None => {
                    let mut ids = query.all_of_type(entity_type)?;
                    ids.sort();
                    entities.extend(ids.into_iter().map(|id| EntityExport {
                        id,
                        entity_type,
                        key: None,
                    }));
                }
            }
        }

        let mut statements = query.all_statements()?;
        statements.sort_by(|a, b| {
            (&a.subject, &a.predicate, &a.object).cmp(&(&b.subject, &b.predicate, &b.object))
        });

        Ok(Self {
            namespace: query.namespace().prefix().to_string(),
            entities,
            statements,
        })
    }

    /// Number of entities of one type.
    pub fn count(&self, entity_type: EntityType) -> usize {
        self.entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .count()
    }
}
