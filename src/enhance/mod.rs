//! Upsert orchestration: turn domain records into the minimal fact set.
//!
//! Every entity type follows the same shape:
//!
//! 1. look up an existing node by natural key,
//! 2. reuse its identifier or mint a new one (type + key facts),
//! 3. emit property facts, retracting a superseded single value first,
//! 4. emit relation facts, after confirming every target already exists.
//!
//! The enhancer never mutates the graph itself. It returns an [`Upserted`]
//! plan; the caller applies the retractions and then inserts all facts in one
//! batch, so nothing is written when a lookup or integrity check fails.

mod component;
mod diagnosis;
pub mod model;
mod trouble_code;
mod vehicle;

use std::collections::HashSet;

use crate::error::{EnhanceError, EnhanceResult};
use crate::fact::Fact;
use crate::ident::EntityId;
use crate::query::GraphQueryTool;
use crate::vocab::EntityType;

pub use model::{
    ChannelRecord, ClassificationModelRecord, ClassificationStep, ComponentRecord,
    ComponentSetRecord, DiagnosisLogRecord, DiagnosticStep, FaultPathRecord, HeatmapRecord,
    InspectionStep, OscillogramRecord, SubComponentRecord, TroubleCodeRecord, VehicleRecord,
};

/// The outcome of one upsert: which node, and what to change.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    pub id: EntityId,
    /// Whether the identifier was minted by this upsert.
    pub created: bool,
    /// Facts to insert, in one batch.
    pub facts: Vec<Fact>,
    /// Superseded facts to retract before inserting.
    pub retractions: Vec<Fact>,
}

impl Upserted {
    fn existing(id: EntityId) -> Self {
        Self {
            id,
            created: false,
            facts: Vec::new(),
            retractions: Vec::new(),
        }
    }

    fn minted(entity_type: EntityType) -> Self {
        let id = EntityId::mint(entity_type);
        let facts = vec![Fact::typed(&id, entity_type)];
        Self {
            id,
            created: true,
            facts,
            retractions: Vec::new(),
        }
    }

    /// Add a fact unless this plan already carries it.
    fn push(&mut self, fact: Fact) {
        if !self.facts.contains(&fact) {
            self.facts.push(fact);
        }
    }

    /// Merge a dependent entity's plan into this one.
    fn absorb(&mut self, other: Upserted) {
        for fact in other.facts {
            self.push(fact);
        }
        for fact in other.retractions {
            if !self.retractions.contains(&fact) {
                self.retractions.push(fact);
            }
        }
    }

    /// Nothing to write.
    pub fn is_noop(&self) -> bool {
        self.facts.is_empty() && self.retractions.is_empty()
    }
}

/// Per-entity-type upsert logic over a [`GraphQueryTool`].
#[derive(Debug, Clone)]
pub struct KnowledgeEnhancer {
    query: GraphQueryTool,
}

impl KnowledgeEnhancer {
    pub fn new(query: GraphQueryTool) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &GraphQueryTool {
        &self.query
    }

    /// Resolve a relation target that must already exist.
    pub(crate) fn require(
        &self,
        relation: &str,
        entity_type: EntityType,
        key: &str,
    ) -> EnhanceResult<EntityId> {
        self.query
            .find_unique(entity_type, key)?
            .ok_or_else(|| EnhanceError::IntegrityViolation {
                relation: relation.to_string(),
                target_type: entity_type.class_name().to_string(),
                target: key.to_string(),
            })
    }

    /// Resolve every name in `keys`, failing on the first missing one.
    fn require_all(
        &self,
        relation: &str,
        entity_type: EntityType,
        keys: &[String],
    ) -> EnhanceResult<Vec<EntityId>> {
        keys.iter()
            .map(|k| self.require(relation, entity_type, k))
            .collect()
    }

    /// Reuse the node with this natural key, or plan a new one.
    fn lookup_or_mint(&self, entity_type: EntityType, key: &str) -> EnhanceResult<Upserted> {
        if let Some(id) = self.query.find_unique(entity_type, key)? {
            return Ok(Upserted::existing(id));
        }
        let mut plan = Upserted::minted(entity_type);
        if let Some(key_pred) = entity_type.natural_key() {
            plan.push(Fact::property(plan.id.as_str(), key_pred, key));
        }
        Ok(plan)
    }

    /// Make `fact` the only value of its predicate on the plan's subject.
    ///
    /// Current values are re-read from the store so the retraction matches
    /// the stored literal exactly.
    fn set_single(&self, plan: &mut Upserted, fact: Fact) -> EnhanceResult<()> {
        if plan.created {
            plan.push(fact);
            return Ok(());
        }
        let mut present = false;
        for current in self.query.statements_with(&plan.id, &fact.predicate)? {
            if current == fact {
                present = true;
            } else if !plan.retractions.contains(&current) {
                plan.retractions.push(current);
            }
        }
        if !present {
            plan.push(fact);
        }
        Ok(())
    }

    /// Append `subject predicate target` edges that are not there yet.
    fn link_all(
        &self,
        plan: &mut Upserted,
        subject: &EntityId,
        subject_is_new: bool,
        predicate: &str,
        targets: &[EntityId],
    ) -> EnhanceResult<()> {
        let existing: HashSet<EntityId> = if subject_is_new {
            HashSet::new()
        } else {
            self.query
                .relation_targets(subject, predicate)?
                .into_iter()
                .collect()
        };
        for target in targets.iter().filter(|t| !existing.contains(*t)) {
            plan.push(Fact::relation(subject.as_str(), predicate, target.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::GraphConnection;
    use crate::vocab::{pred, Namespace};
    use std::sync::Arc;

    pub(crate) fn enhancer() -> KnowledgeEnhancer {
        let conn = GraphConnection::in_memory(Namespace::default()).unwrap();
        KnowledgeEnhancer::new(GraphQueryTool::new(Arc::new(conn)))
    }

    /// Apply a plan the way the facade does.
    pub(crate) fn apply(enhancer: &KnowledgeEnhancer, plan: &Upserted) {
        let conn = enhancer.query().connection();
        conn.delete(&plan.retractions).unwrap();
        conn.insert(&plan.facts).unwrap();
    }

    #[test]
    fn minted_plan_carries_type_and_key() {
        let enhancer = enhancer();
        let plan = enhancer
            .lookup_or_mint(EntityType::Symptom, "rough idle")
            .unwrap();
        assert!(plan.created);
        assert!(plan.id.as_str().starts_with("symptom_"));
        assert_eq!(plan.facts.len(), 2);
    }

    #[test]
    fn set_single_retracts_previous_value() {
        let enhancer = enhancer();
        let mut plan = enhancer
            .lookup_or_mint(EntityType::Vehicle, "VIN1")
            .unwrap();
        plan.push(Fact::property(plan.id.as_str(), pred::MODEL, "Golf"));
        apply(&enhancer, &plan);

        let mut again = enhancer
            .lookup_or_mint(EntityType::Vehicle, "VIN1")
            .unwrap();
        assert!(!again.created);
        let id = again.id.clone();
        enhancer
            .set_single(&mut again, Fact::property(id.as_str(), pred::MODEL, "Passat"))
            .unwrap();
        assert_eq!(again.retractions, vec![Fact::property(id.as_str(), pred::MODEL, "Golf")]);
        assert_eq!(again.facts, vec![Fact::property(id.as_str(), pred::MODEL, "Passat")]);

        // Same value again: nothing to do.
        let mut same = Upserted::existing(id.clone());
        enhancer
            .set_single(&mut same, Fact::property(id.as_str(), pred::MODEL, "Golf"))
            .unwrap();
        assert!(same.is_noop());
    }

    #[test]
    fn require_reports_missing_target() {
        let enhancer = enhancer();
        let err = enhancer
            .require(pred::AFFECTED_BY, EntityType::SuspectComponent, "Ghost")
            .unwrap_err();
        assert!(matches!(
            err,
            EnhanceError::IntegrityViolation { ref target, .. } if target == "Ghost"
        ));
    }
}
