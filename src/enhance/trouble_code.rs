use std::collections::HashSet;

use crate::error::EnhanceResult;
use crate::fact::Fact;
use crate::ident::EntityId;
use crate::query::at_most_one;
use crate::vocab::{pred, EntityType};

use super::{KnowledgeEnhancer, TroubleCodeRecord, Upserted};

impl KnowledgeEnhancer {
    /// Check that everything a trouble-code record points at exists.
    pub fn validate_trouble_code(&self, record: &TroubleCodeRecord) -> EnhanceResult<()> {
        self.trouble_code_targets(record).map(|_| ())
    }

    fn trouble_code_targets(
        &self,
        record: &TroubleCodeRecord,
    ) -> EnhanceResult<(Vec<EntityId>, Vec<EntityId>, Option<EntityId>)> {
        let co_codes = self.require_all(pred::OCCURS_WITH, EntityType::TroubleCode, &record.occurs_with)?;
        let components = self.require_all(
            pred::POINTS_TO,
            EntityType::SuspectComponent,
            &record.suspect_components,
        )?;
        let subsystem = record
            .subsystem
            .as_deref()
            .map(|name| self.require(pred::AFFECTS, EntityType::ComponentSet, name))
            .transpose()?;
        Ok((co_codes, components, subsystem))
    }

    /// Plan the upsert of a trouble code.
    ///
    /// Category, fault condition and symptoms are looked up by description
    /// and created when unknown. Co-occurring codes, suspect components and
    /// the subsystem must already exist. A changed category or condition
    /// replaces the previous link; every other relation is append-only.
    pub fn trouble_code(&self, record: &TroubleCodeRecord) -> EnhanceResult<Upserted> {
        let (co_codes, components, subsystem) = self.trouble_code_targets(record)?;

        let mut plan = self.lookup_or_mint(EntityType::TroubleCode, &record.code)?;
        let dtc = plan.id.clone();
        let created = plan.created;

        if let Some(ref code_type) = record.code_type {
            self.set_single(
                &mut plan,
                Fact::property(dtc.as_str(), pred::CODE_TYPE, code_type.as_str()),
            )?;
        }

        if let Some(ref category) = record.category {
            let cat = self.lookup_or_mint(EntityType::FaultCategory, category)?;
            let cat_id = cat.id.clone();
            plan.absorb(cat);
            self.set_single(
                &mut plan,
                Fact::relation(dtc.as_str(), pred::HAS_CATEGORY, cat_id.as_str()),
            )?;
        }

        let condition = match record.condition {
            Some(ref description) => {
                let cond = self.lookup_or_mint(EntityType::FaultCondition, description)?;
                let cond_id = cond.id.clone();
                let cond_new = cond.created;
                plan.absorb(cond);
                self.set_single(
                    &mut plan,
                    Fact::relation(dtc.as_str(), pred::REPRESENTS, cond_id.as_str()),
                )?;
                Some((cond_id, cond_new))
            }
            None if created => None,
            None => {
                let current = self.query.relation_targets(&dtc, pred::REPRESENTS)?;
                at_most_one(current, "FaultCondition", &record.code)?.map(|id| (id, false))
            }
        };

        if !record.symptoms.is_empty() {
            match condition {
                Some((cond_id, cond_new)) => {
                    let mut symptoms = Vec::with_capacity(record.symptoms.len());
                    for description in &record.symptoms {
                        let symptom = self.lookup_or_mint(EntityType::Symptom, description)?;
                        symptoms.push(symptom.id.clone());
                        plan.absorb(symptom);
                    }
                    self.link_all(&mut plan, &cond_id, cond_new, pred::MANIFESTED_BY, &symptoms)?;
                }
                None => tracing::warn!(
                    code = %record.code,
                    "symptoms given without a fault condition, not linked"
                ),
            }
        }

        self.link_all(&mut plan, &dtc, created, pred::OCCURS_WITH, &co_codes)?;
        self.plan_associations(&mut plan, &dtc, created, &components)?;

        if let Some(set) = subsystem {
            self.link_all(&mut plan, &dtc, created, pred::AFFECTS, std::slice::from_ref(&set))?;
            self.link_all(&mut plan, &set, false, pred::CONTAINS, &components)?;
        }

        Ok(plan)
    }

    /// One association per (code, component) pair, numbered in list order.
    ///
    /// Pairs that already have an association keep it and its priority. A new
    /// association gets its list index as priority, bumped past the highest
    /// priority already taken so two suspects never share one. A fresh code
    /// therefore gets `0..n` in list order; when appending to an existing
    /// list the priority is intentionally not the bare list index.
    fn plan_associations(
        &self,
        plan: &mut Upserted,
        dtc: &EntityId,
        created: bool,
        components: &[EntityId],
    ) -> EnhanceResult<()> {
        let existing = if created {
            Vec::new()
        } else {
            self.query.associations_of(dtc)?
        };
        let mut linked: HashSet<&EntityId> = existing.iter().map(|a| &a.component).collect();
        let mut next = existing.iter().map(|a| a.priority + 1).max().unwrap_or(0);

        for (index, component) in components.iter().enumerate() {
            if !linked.insert(component) {
                continue;
            }
            let priority = (index as u32).max(next);
            let assoc = Upserted::minted(EntityType::DiagnosticAssociation);
            let assoc_id = assoc.id.clone();
            plan.absorb(assoc);
            plan.push(Fact::relation(dtc.as_str(), pred::HAS_ASSOCIATION, assoc_id.as_str()));
            plan.push(Fact::relation(assoc_id.as_str(), pred::POINTS_TO, component.as_str()));
            plan.push(Fact::property(assoc_id.as_str(), pred::PRIORITY_ID, priority.to_string()));
            next = priority + 1;
        }
        Ok(())
    }
}
