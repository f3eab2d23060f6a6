//! Parameterised lookups over the fixed OBD vocabulary.
//!
//! [`GraphQueryTool`] resolves natural keys to opaque identifiers and answers
//! relationship questions. It is backend-agnostic: the same query text runs
//! against the remote store or a local graph. Every call is one fresh round
//! trip; nothing is cached.
//!
//! Natural keys match byte-for-byte via `FILTER(STR(?key) = "...")`. Lookups
//! that must be unique report [`QueryError::AmbiguousMatch`] instead of picking
//! an arbitrary row.

pub mod component;
pub mod diagnosis;
pub mod rows;
pub mod trouble_code;

use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::fact::Fact;
use crate::graph::{Binding, GraphConnection};
use crate::ident::EntityId;
use crate::vocab::{EntityType, Namespace, RDF_TYPE};

use rows::{EntityRow, FromBinding, KeyRow, StatementRow, TripleRow};

pub use component::ComponentSummary;
pub use trouble_code::TroubleCodeSummary;

/// Library of lookup queries sharing one connection.
#[derive(Clone)]
pub struct GraphQueryTool {
    conn: Arc<GraphConnection>,
}

impl GraphQueryTool {
    pub fn new(conn: Arc<GraphConnection>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Arc<GraphConnection> {
        &self.conn
    }

    pub fn namespace(&self) -> &Namespace {
        self.conn.namespace()
    }

    fn prologue(&self) -> String {
        format!(
            "PREFIX obd: <{}>\nPREFIX rdf: <{}>\n",
            self.namespace().prefix(),
            RDF_TYPE.trim_end_matches("type")
        )
    }

    /// Run a query body (everything after the prefixes).
    pub fn select(&self, body: &str) -> QueryResult<Vec<Binding>> {
        let sparql = format!("{}{body}", self.prologue());
        Ok(self.conn.query(&sparql)?)
    }

    /// Run a query body and decode each row.
    pub fn rows<R: FromBinding>(&self, body: &str) -> QueryResult<Vec<R>> {
        let ns = self.namespace();
        self.select(body)?
            .iter()
            .map(|row| R::from_binding(row, ns))
            .collect()
    }

    /// `<full-iri>` for an entity, ready to splice into query text.
    pub(crate) fn iri(&self, id: &EntityId) -> String {
        format!("<{}>", self.namespace().resolve(id.as_str()))
    }

    fn ids(&self, body: &str) -> QueryResult<Vec<EntityId>> {
        Ok(self
            .rows::<EntityRow>(body)?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }

    fn keys(&self, body: &str) -> QueryResult<Vec<String>> {
        Ok(self
            .rows::<KeyRow>(body)?
            .into_iter()
            .map(|r| r.key)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Generic lookups
    // -----------------------------------------------------------------------

    /// Every entity of `entity_type` whose natural key equals `key`.
    ///
    /// Types without a natural key never match.
    pub fn entity_by_key(&self, entity_type: EntityType, key: &str) -> QueryResult<Vec<EntityId>> {
        let Some(key_pred) = entity_type.natural_key() else {
            return Ok(Vec::new());
        };
        self.ids(&format!(
            "SELECT DISTINCT ?id WHERE {{\n\
             ?id rdf:type obd:{class} ;\n\
                 obd:{key_pred} ?key .\n\
             FILTER(STR(?key) = \"{value}\")\n\
             }}",
            class = entity_type.class_name(),
            value = escape_literal(key),
        ))
    }

    /// The entity with this natural key, if any. More than one is an error.
    pub fn find_unique(&self, entity_type: EntityType, key: &str) -> QueryResult<Option<EntityId>> {
        let hits = self.entity_by_key(entity_type, key)?;
        at_most_one(hits, entity_type.class_name(), key)
    }

    pub fn exists(&self, entity_type: EntityType, key: &str) -> QueryResult<bool> {
        Ok(self.find_unique(entity_type, key)?.is_some())
    }

    pub fn all_of_type(&self, entity_type: EntityType) -> QueryResult<Vec<EntityId>> {
        self.ids(&format!(
            "SELECT DISTINCT ?id WHERE {{ ?id rdf:type obd:{} }}",
            entity_type.class_name()
        ))
    }

    /// All natural keys of a type, sorted.
    pub fn natural_keys(&self, entity_type: EntityType) -> QueryResult<Vec<String>> {
        let Some(key_pred) = entity_type.natural_key() else {
            return Ok(Vec::new());
        };
        let mut keys = self.keys(&format!(
            "SELECT DISTINCT ?key WHERE {{ ?id rdf:type obd:{} ; obd:{key_pred} ?key }}",
            entity_type.class_name()
        ))?;
        keys.sort();
        Ok(keys)
    }

    /// The natural key of a known entity.
    pub fn natural_key_of(&self, id: &EntityId, entity_type: EntityType) -> QueryResult<Option<String>> {
        let Some(key_pred) = entity_type.natural_key() else {
            return Ok(None);
        };
        let keys = self.property_values(id, key_pred)?;
        at_most_one(keys, key_pred, id.as_str())
    }

    /// Objects of `source predicate ?id`.
    pub fn relation_targets(&self, source: &EntityId, predicate: &str) -> QueryResult<Vec<EntityId>> {
        self.ids(&format!(
            "SELECT DISTINCT ?id WHERE {{ {} obd:{predicate} ?id }}",
            self.iri(source)
        ))
    }

    /// Subjects of `?id predicate target`.
    pub fn relation_sources(&self, predicate: &str, target: &EntityId) -> QueryResult<Vec<EntityId>> {
        self.ids(&format!(
            "SELECT DISTINCT ?id WHERE {{ ?id obd:{predicate} {} }}",
            self.iri(target)
        ))
    }

    /// Literal values of one property of an entity.
    pub fn property_values(&self, entity: &EntityId, property: &str) -> QueryResult<Vec<String>> {
        self.keys(&format!(
            "SELECT ?key WHERE {{ {} obd:{property} ?key }}",
            self.iri(entity)
        ))
    }

    /// Every outgoing statement of an entity, rebuilt as exact facts.
    pub fn outgoing_facts(&self, entity: &EntityId) -> QueryResult<Vec<Fact>> {
        let rows: Vec<StatementRow> = self.rows(&format!(
            "SELECT ?p ?o (isLiteral(?o) AS ?lit) (DATATYPE(?o) AS ?dt) (LANG(?o) AS ?lang)\n\
             WHERE {{ {} ?p ?o }}",
            self.iri(entity)
        ))?;
        Ok(rows.into_iter().map(|r| r.into_fact(entity)).collect())
    }

    /// Outgoing statements of an entity under one predicate, as exact facts.
    pub fn statements_with(&self, entity: &EntityId, predicate: &str) -> QueryResult<Vec<Fact>> {
        let rows: Vec<StatementRow> = self.rows(&format!(
            "SELECT ?p ?o (isLiteral(?o) AS ?lit) (DATATYPE(?o) AS ?dt) (LANG(?o) AS ?lang) WHERE {{\n\
             VALUES ?p {{ obd:{predicate} }}\n\
             {} ?p ?o .\n}}",
            self.iri(entity)
        ))?;
        Ok(rows.into_iter().map(|r| r.into_fact(entity)).collect())
    }

    /// Dump of every statement in the default graph.
    pub fn all_statements(&self) -> QueryResult<Vec<TripleRow>> {
        self.rows("SELECT ?s ?p ?o (isLiteral(?o) AS ?lit) WHERE { ?s ?p ?o }")
    }
}

impl std::fmt::Debug for GraphQueryTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQueryTool")
            .field("conn", &self.conn)
            .finish()
    }
}

/// Escape a string for use inside a double-quoted SPARQL literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Zero hits is `None`, one is `Some`, more is [`QueryError::AmbiguousMatch`].
pub(crate) fn at_most_one<T>(mut hits: Vec<T>, what: &str, key: &str) -> QueryResult<Option<T>> {
    match hits.len() {
        0 => Ok(None),
        1 => Ok(hits.pop()),
        count => Err(QueryError::AmbiguousMatch {
            what: what.to_string(),
            key: key.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::pred;

    fn tool() -> GraphQueryTool {
        let conn = GraphConnection::in_memory(Namespace::default()).unwrap();
        GraphQueryTool::new(Arc::new(conn))
    }

    fn add(tool: &GraphQueryTool, facts: &[Fact]) {
        tool.connection().insert(facts).unwrap();
    }

    #[test]
    fn escape_handles_quotes_and_backslashes() {
        assert_eq!(escape_literal(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        assert_eq!(escape_literal("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn natural_key_lookup_is_exact() {
        let tool = tool();
        let id = EntityId::new("comp_1");
        add(
            &tool,
            &[
                Fact::typed(&id, EntityType::SuspectComponent),
                Fact::property(id.as_str(), pred::COMPONENT_NAME, "Lambda sensor"),
            ],
        );
        assert_eq!(
            tool.find_unique(EntityType::SuspectComponent, "Lambda sensor").unwrap(),
            Some(id)
        );
        assert_eq!(
            tool.find_unique(EntityType::SuspectComponent, "lambda sensor").unwrap(),
            None
        );
        assert_eq!(
            tool.find_unique(EntityType::SuspectComponent, "Lambda").unwrap(),
            None
        );
        // Same key, different type.
        assert_eq!(
            tool.find_unique(EntityType::SubComponent, "Lambda sensor").unwrap(),
            None
        );
    }

    #[test]
    fn duplicate_natural_key_is_ambiguous() {
        let tool = tool();
        for id in ["dtc_a", "dtc_b"] {
            let id = EntityId::new(id);
            add(
                &tool,
                &[
                    Fact::typed(&id, EntityType::TroubleCode),
                    Fact::property(id.as_str(), pred::CODE, "P0301"),
                ],
            );
        }
        let err = tool.find_unique(EntityType::TroubleCode, "P0301").unwrap_err();
        assert!(matches!(err, QueryError::AmbiguousMatch { count: 2, .. }));
        assert_eq!(tool.entity_by_key(EntityType::TroubleCode, "P0301").unwrap().len(), 2);
    }

    #[test]
    fn keys_with_quotes_do_not_break_queries() {
        let tool = tool();
        let id = EntityId::new("symptom_1");
        add(
            &tool,
            &[
                Fact::typed(&id, EntityType::Symptom),
                Fact::property(id.as_str(), pred::SYMPTOM_DESCRIPTION, "engine \"hiccups\""),
            ],
        );
        assert_eq!(
            tool.find_unique(EntityType::Symptom, "engine \"hiccups\"").unwrap(),
            Some(id)
        );
    }

    #[test]
    fn outgoing_facts_round_trip_through_delete() {
        let tool = tool();
        let id = EntityId::new("diag_association_1");
        add(
            &tool,
            &[
                Fact::typed(&id, EntityType::DiagnosticAssociation),
                Fact::property(id.as_str(), pred::PRIORITY_ID, "3"),
                Fact::relation(id.as_str(), pred::POINTS_TO, "comp_1"),
            ],
        );
        let facts = tool.outgoing_facts(&id).unwrap();
        assert_eq!(facts.len(), 3);
        tool.connection().delete(&facts).unwrap();
        assert!(tool.all_statements().unwrap().is_empty());
    }

    #[test]
    fn natural_keys_are_sorted() {
        let tool = tool();
        for (id, name) in [("comp_2", "Throttle"), ("comp_1", "Battery")] {
            let id = EntityId::new(id);
            add(
                &tool,
                &[
                    Fact::typed(&id, EntityType::SuspectComponent),
                    Fact::property(id.as_str(), pred::COMPONENT_NAME, name),
                ],
            );
        }
        assert_eq!(
            tool.natural_keys(EntityType::SuspectComponent).unwrap(),
            vec!["Battery".to_string(), "Throttle".to_string()]
        );
        assert!(tool.natural_keys(EntityType::DiagnosisLog).unwrap().is_empty());
    }
}
