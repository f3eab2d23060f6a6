//! The atomic unit of mutation: one subject/predicate/object statement.
//!
//! A fact is either a *relation* (object is another entity) or a *property*
//! (object is a literal). The same value is handed to the connection for
//! insertion and for retraction, so a property fact must carry the exact
//! datatype the store holds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ident::EntityId;
use crate::vocab::{self, EntityType, RDF_LANG_STRING, RDF_TYPE, XSD_NS};

/// Literal datatype of a property fact.
///
/// The client writes only the first four. The other two exist so a literal
/// read back from data written elsewhere can be retracted term-for-term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    /// Plain literal (`xsd:string`).
    String,
    Integer,
    Boolean,
    Double,
    /// Language-tagged string with its tag, e.g. `"Golf"@de`.
    Language(String),
    /// Any other datatype, kept as its full IRI (`xsd:int`, `xsd:dateTime`, ...).
    Other(String),
}

impl Datatype {
    /// Full datatype IRI, or `None` for plain string literals.
    pub fn iri(&self) -> Option<String> {
        match self {
            Datatype::String => None,
            Datatype::Integer => Some(format!("{XSD_NS}integer")),
            Datatype::Boolean => Some(format!("{XSD_NS}boolean")),
            Datatype::Double => Some(format!("{XSD_NS}double")),
            Datatype::Language(_) => Some(RDF_LANG_STRING.to_string()),
            Datatype::Other(iri) => Some(iri.clone()),
        }
    }

    /// Map a datatype IRI reported by the store back to a `Datatype`.
    ///
    /// Only the exact IRIs the client writes map to the named variants;
    /// everything else is kept verbatim. Language-tagged literals are rebuilt
    /// from their tag, not from this IRI.
    pub fn from_iri(iri: &str) -> Self {
        match iri.strip_prefix(XSD_NS) {
            Some("string") => Datatype::String,
            Some("integer") => Datatype::Integer,
            Some("boolean") => Datatype::Boolean,
            Some("double") => Datatype::Double,
            _ => Datatype::Other(iri.to_string()),
        }
    }
}

/// Object position of a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactObject {
    /// Reference to another node (local name or absolute IRI).
    Resource(String),
    /// Literal value with its datatype.
    Literal { value: String, datatype: Datatype },
}

/// A single statement to add to or remove from the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: FactObject,
}

impl Fact {
    /// Resource-valued fact: `subject predicate object`.
    pub fn relation(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: FactObject::Resource(object.into()),
        }
    }

    /// Literal-valued fact. The datatype is fixed by the predicate.
    pub fn property(
        subject: impl Into<String>,
        predicate: &str,
        value: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.to_string(),
            object: FactObject::Literal {
                value: value.into(),
                datatype: vocab::datatype_of(predicate),
            },
        }
    }

    /// Literal fact with an explicit datatype, for values read back from the store.
    pub fn literal(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        value: impl Into<String>,
        datatype: Datatype,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: FactObject::Literal {
                value: value.into(),
                datatype,
            },
        }
    }

    /// `rdf:type` fact for a freshly minted entity.
    pub fn typed(id: &EntityId, entity_type: EntityType) -> Self {
        Self::relation(id.as_str(), RDF_TYPE, entity_type.class_name())
    }

    /// Whether the object is a literal ("property fact").
    pub fn is_literal(&self) -> bool {
        matches!(self.object, FactObject::Literal { .. })
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            FactObject::Resource(o) => write!(f, "({}, {}, {o})", self.subject, self.predicate),
            FactObject::Literal { value, .. } => {
                write!(f, "({}, {}, \"{value}\")", self.subject, self.predicate)
            }
        }
    }
}
