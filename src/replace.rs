//! Retraction planning for confirmed overwrites.
//!
//! Before a corrected record is published over an existing entity, the facts
//! that must not coexist with it are computed from the live graph:
//!
//! 1. single-valued properties, re-read so each retraction matches the stored
//!    literal and datatype exactly;
//! 2. relations owned exclusively by the entity, including owned nodes such
//!    as diagnostic associations;
//! 3. shared relations, retracted only when a count query shows no other
//!    owner still justifies them.
//!
//! The counts are recomputed on every call; nothing is stored. The entity's
//! own type and natural-key facts are kept, so the identifier survives the
//! overwrite.

use std::collections::HashSet;

use crate::error::QueryResult;
use crate::fact::Fact;
use crate::ident::EntityId;
use crate::query::GraphQueryTool;
use crate::vocab::{pred, EntityType};

/// Ordered, duplicate-free retraction list.
#[derive(Debug, Default)]
struct Retractions {
    seen: HashSet<Fact>,
    facts: Vec<Fact>,
}

impl Retractions {
    fn add(&mut self, fact: Fact) {
        if self.seen.insert(fact.clone()) {
            self.facts.push(fact);
        }
    }

    fn extend(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for fact in facts {
            self.add(fact);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Replacer {
    query: GraphQueryTool,
}

impl Replacer {
    pub fn new(query: GraphQueryTool) -> Self {
        Self { query }
    }

    /// Every current fact of `entity` under `predicate`.
    fn owned(&self, entity: &EntityId, predicate: &str) -> QueryResult<Vec<Fact>> {
        self.query.statements_with(entity, predicate)
    }

    /// Facts to retract before overwriting a trouble code.
    ///
    /// Empty when the code is unknown. Fault categories and symptoms are
    /// shared vocabulary and stay. A fault condition node is removed only
    /// when no other code represents it. A subsystem's `contains` edge is
    /// removed only when no other code affecting the subsystem still points
    /// at the component.
    pub fn trouble_code_retractions(&self, code: &str) -> QueryResult<Vec<Fact>> {
        let Some(dtc) = self.query.trouble_code_by_code(code)? else {
            return Ok(Vec::new());
        };
        let mut out = Retractions::default();

        out.extend(self.owned(&dtc, pred::CODE_TYPE)?);
        out.extend(self.owned(&dtc, pred::HAS_CATEGORY)?);
        out.extend(self.owned(&dtc, pred::OCCURS_WITH)?);

        for condition in self.query.relation_targets(&dtc, pred::REPRESENTS)? {
            out.add(Fact::relation(dtc.as_str(), pred::REPRESENTS, condition.as_str()));
            let others = self
                .query
                .codes_representing(&condition)?
                .into_iter()
                .filter(|other| *other != dtc)
                .count();
            if others == 0 {
                out.extend(self.query.outgoing_facts(&condition)?);
            } else {
                tracing::debug!(%condition, others, "fault condition still shared, kept");
            }
        }

        let associations = self.query.relation_targets(&dtc, pred::HAS_ASSOCIATION)?;
        let mut components = Vec::new();
        for association in &associations {
            out.add(Fact::relation(
                dtc.as_str(),
                pred::HAS_ASSOCIATION,
                association.as_str(),
            ));
            components.extend(self.query.relation_targets(association, pred::POINTS_TO)?);
            out.extend(self.query.outgoing_facts(association)?);
        }

        for set in self.query.relation_targets(&dtc, pred::AFFECTS)? {
            out.add(Fact::relation(dtc.as_str(), pred::AFFECTS, set.as_str()));
            let contained: HashSet<EntityId> = self
                .query
                .relation_targets(&set, pred::CONTAINS)?
                .into_iter()
                .collect();
            for component in components.iter().filter(|c| contained.contains(*c)) {
                let justified = self.query.contains_justifications(&set, component, &dtc)?;
                if justified == 0 {
                    out.add(Fact::relation(set.as_str(), pred::CONTAINS, component.as_str()));
                } else {
                    tracing::debug!(%set, %component, justified, "contains edge still justified, kept");
                }
            }
        }

        Ok(out.facts)
    }

    /// Oscilloscope flag and `affected_by` edges of a component.
    pub fn component_retractions(&self, name: &str) -> QueryResult<Vec<Fact>> {
        let Some(comp) = self.query.component_by_name(name)? else {
            return Ok(Vec::new());
        };
        let mut out = Retractions::default();
        out.extend(self.owned(&comp, pred::USE_OSCILLOSCOPE)?);
        out.extend(self.owned(&comp, pred::AFFECTED_BY)?);
        Ok(out.facts)
    }

    /// `includes` edges of a set and the `verifies` edges pointing at it.
    ///
    /// `contains` edges are derived from trouble codes and stay.
    pub fn component_set_retractions(&self, name: &str) -> QueryResult<Vec<Fact>> {
        let Some(set) = self.query.set_by_name(name)? else {
            return Ok(Vec::new());
        };
        let mut out = Retractions::default();
        out.extend(self.owned(&set, pred::INCLUDES)?);
        for component in self.query.relation_sources(pred::VERIFIES, &set)? {
            out.add(Fact::relation(component.as_str(), pred::VERIFIES, set.as_str()));
        }
        Ok(out.facts)
    }

    /// Model, HSN and TSN of a vehicle. Diagnosis logs are history and stay.
    pub fn vehicle_retractions(&self, vin: &str) -> QueryResult<Vec<Fact>> {
        let Some(vehicle) = self.query.find_unique(EntityType::Vehicle, vin)? else {
            return Ok(Vec::new());
        };
        let mut out = Retractions::default();
        for predicate in [pred::MODEL, pred::HSN, pred::TSN] {
            out.extend(self.owned(&vehicle, predicate)?);
        }
        Ok(out.facts)
    }
}
