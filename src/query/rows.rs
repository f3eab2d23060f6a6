//! Typed result rows.
//!
//! Every query decodes its bindings into one of these structs right at the
//! query boundary, so a misspelled variable fails here and not three calls
//! later.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::fact::{Datatype, Fact};
use crate::graph::Binding;
use crate::ident::EntityId;
use crate::vocab::{EntityType, Namespace};

/// Decode one binding row.
pub trait FromBinding: Sized {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self>;
}

pub(crate) fn text(row: &Binding, var: &str) -> QueryResult<String> {
    row.get(var).cloned().ok_or_else(|| QueryError::Decode {
        variable: var.into(),
        message: "unbound".into(),
    })
}

pub(crate) fn entity(row: &Binding, var: &str, ns: &Namespace) -> QueryResult<EntityId> {
    let iri = text(row, var)?;
    Ok(EntityId::new(ns.local_name(&iri)))
}

pub(crate) fn number<T: FromStr>(row: &Binding, var: &str) -> QueryResult<T>
where
    T::Err: std::fmt::Display,
{
    let raw = text(row, var)?;
    raw.trim().parse().map_err(|e: T::Err| QueryError::Decode {
        variable: var.into(),
        message: format!("\"{raw}\": {e}"),
    })
}

pub(crate) fn flag(row: &Binding, var: &str) -> QueryResult<bool> {
    match text(row, var)?.as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(QueryError::Decode {
            variable: var.into(),
            message: format!("\"{other}\" is not a boolean"),
        }),
    }
}

fn optional<T>(row: &Binding, var: &str, f: impl FnOnce() -> QueryResult<T>) -> QueryResult<Option<T>> {
    if row.contains_key(var) { f().map(Some) } else { Ok(None) }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// `?id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    pub id: EntityId,
}

impl FromBinding for EntityRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            id: entity(row, "id", ns)?,
        })
    }
}

/// `?key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub key: String,
}

impl FromBinding for KeyRow {
    fn from_binding(row: &Binding, _ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            key: text(row, "key")?,
        })
    }
}

/// `?id ?key`: an entity together with its natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityKeyRow {
    pub id: EntityId,
    pub key: String,
}

impl FromBinding for EntityKeyRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            id: entity(row, "id", ns)?,
            key: text(row, "key")?,
        })
    }
}

/// `?count`
#[derive(Debug, Clone, Copy)]
pub struct CountRow {
    pub count: u64,
}

impl FromBinding for CountRow {
    fn from_binding(row: &Binding, _ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            count: number(row, "count")?,
        })
    }
}

/// One suspect component of a trouble code, with its suggestion priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationRow {
    pub association: EntityId,
    pub component: EntityId,
    pub component_name: String,
    pub priority: u32,
}

impl FromBinding for AssociationRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            association: entity(row, "association", ns)?,
            component: entity(row, "component", ns)?,
            component_name: text(row, "name")?,
            priority: number(row, "priority")?,
        })
    }
}

/// An outgoing statement of a known subject: `?p ?o ?lit ?dt ?lang`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRow {
    pub predicate: String,
    pub object: String,
    pub is_literal: bool,
    pub datatype: Option<String>,
    /// Language tag of a tagged literal. `LANG()` yields `""` otherwise.
    pub language: Option<String>,
}

impl FromBinding for StatementRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        let is_literal = flag(row, "lit")?;
        let object = text(row, "o")?;
        Ok(Self {
            predicate: ns.local_name(&text(row, "p")?).to_string(),
            object: if is_literal {
                object
            } else {
                ns.local_name(&object).to_string()
            },
            is_literal,
            datatype: row.get("dt").cloned(),
            language: row.get("lang").filter(|tag| !tag.is_empty()).cloned(),
        })
    }
}

impl StatementRow {
    /// Rebuild the exact fact for `subject`, e.g. to retract it.
    pub fn into_fact(self, subject: &EntityId) -> Fact {
        if self.is_literal {
            let datatype = match (self.language, self.datatype.as_deref()) {
                (Some(tag), _) => Datatype::Language(tag),
                (None, None) => Datatype::String,
                (None, Some(iri)) => Datatype::from_iri(iri),
            };
            Fact::literal(subject.as_str(), self.predicate, self.object, datatype)
        } else {
            Fact::relation(subject.as_str(), self.predicate, self.object)
        }
    }
}

/// Any statement in the graph, for export: `?s ?p ?o ?lit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleRow {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub is_literal: bool,
}

impl FromBinding for TripleRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        let is_literal = flag(row, "lit")?;
        let object = text(row, "o")?;
        Ok(Self {
            subject: ns.local_name(&text(row, "s")?).to_string(),
            predicate: ns.local_name(&text(row, "p")?).to_string(),
            object: if is_literal {
                object
            } else {
                ns.local_name(&object).to_string()
            },
            is_literal,
        })
    }
}

/// Vehicle properties keyed by VIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRow {
    pub id: EntityId,
    pub vin: String,
    pub model: Option<String>,
    pub hsn: Option<String>,
    pub tsn: Option<String>,
}

impl FromBinding for VehicleRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            id: entity(row, "id", ns)?,
            vin: text(row, "vin")?,
            model: row.get("model").cloned(),
            hsn: row.get("hsn").cloned(),
            tsn: row.get("tsn").cloned(),
        })
    }
}

/// One step of a diagnosis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRow {
    pub id: EntityId,
    pub kind: EntityType,
    pub step: u32,
    pub prediction: Option<bool>,
    pub component: Option<String>,
}

impl FromBinding for StepRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        let class = text(row, "type")?;
        let kind =
            EntityType::from_class_name(ns.local_name(&class)).ok_or_else(|| QueryError::Decode {
                variable: "type".into(),
                message: format!("unknown step class {class}"),
            })?;
        Ok(Self {
            id: entity(row, "id", ns)?,
            kind,
            step: number(row, "step")?,
            prediction: optional(row, "prediction", || flag(row, "prediction"))?,
            component: row.get("component").cloned(),
        })
    }
}

/// Classification outcome of one oscillogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRow {
    pub id: EntityId,
    pub prediction: bool,
    pub uncertainty: Option<f64>,
    pub model_id: Option<String>,
    pub oscillogram: Option<EntityId>,
    pub heatmap: Option<EntityId>,
}

impl FromBinding for ClassificationRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        Ok(Self {
            id: entity(row, "id", ns)?,
            prediction: flag(row, "prediction")?,
            uncertainty: optional(row, "uncertainty", || number(row, "uncertainty"))?,
            model_id: row.get("model").cloned(),
            oscillogram: optional(row, "oscillogram", || entity(row, "oscillogram", ns))?,
            heatmap: optional(row, "heatmap", || entity(row, "heatmap", ns))?,
        })
    }
}

/// Heatmap with its decoded values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRow {
    pub id: EntityId,
    pub generation_method: String,
    pub values: Vec<f64>,
}

impl FromBinding for HeatmapRow {
    fn from_binding(row: &Binding, ns: &Namespace) -> QueryResult<Self> {
        let raw = text(row, "values")?;
        let values = serde_json::from_str(&raw).map_err(|e| QueryError::Decode {
            variable: "values".into(),
            message: e.to_string(),
        })?;
        Ok(Self {
            id: entity(row, "id", ns)?,
            generation_method: text(row, "method")?,
            values,
        })
    }
}
