use crate::error::EnhanceResult;
use crate::fact::Fact;
use crate::vocab::{pred, EntityType};

use super::{
    ComponentRecord, ComponentSetRecord, KnowledgeEnhancer, SubComponentRecord, Upserted,
};

impl KnowledgeEnhancer {
    pub fn validate_component(&self, record: &ComponentRecord) -> EnhanceResult<()> {
        self.require_all(pred::AFFECTED_BY, EntityType::SuspectComponent, &record.affected_by)
            .map(|_| ())
    }

    /// Plan the upsert of a suspect component.
    ///
    /// `affected_by` names must already exist; the oscilloscope flag is
    /// replaced when supplied.
    pub fn component(&self, record: &ComponentRecord) -> EnhanceResult<Upserted> {
        let affected_by =
            self.require_all(pred::AFFECTED_BY, EntityType::SuspectComponent, &record.affected_by)?;

        let mut plan = self.lookup_or_mint(EntityType::SuspectComponent, &record.name)?;
        let id = plan.id.clone();
        if let Some(flag) = record.use_oscilloscope {
            self.set_single(
                &mut plan,
                Fact::property(id.as_str(), pred::USE_OSCILLOSCOPE, flag.to_string()),
            )?;
        }
        let created = plan.created;
        self.link_all(&mut plan, &id, created, pred::AFFECTED_BY, &affected_by)?;
        Ok(plan)
    }

    pub fn subcomponent(&self, record: &SubComponentRecord) -> EnhanceResult<Upserted> {
        let parent = self.require(pred::PART_OF, EntityType::SuspectComponent, &record.part_of)?;
        let mut plan = self.lookup_or_mint(EntityType::SubComponent, &record.name)?;
        let id = plan.id.clone();
        self.set_single(
            &mut plan,
            Fact::relation(id.as_str(), pred::PART_OF, parent.as_str()),
        )?;
        Ok(plan)
    }

    pub fn validate_component_set(&self, record: &ComponentSetRecord) -> EnhanceResult<()> {
        self.require_all(pred::INCLUDES, EntityType::SuspectComponent, &record.includes)?;
        self.require_all(pred::VERIFIES, EntityType::SuspectComponent, &record.verified_by)?;
        Ok(())
    }

    /// Plan the upsert of a component set. Members must already exist.
    pub fn component_set(&self, record: &ComponentSetRecord) -> EnhanceResult<Upserted> {
        let includes =
            self.require_all(pred::INCLUDES, EntityType::SuspectComponent, &record.includes)?;
        let verifiers =
            self.require_all(pred::VERIFIES, EntityType::SuspectComponent, &record.verified_by)?;

        let mut plan = self.lookup_or_mint(EntityType::ComponentSet, &record.name)?;
        let set = plan.id.clone();
        let created = plan.created;
        self.link_all(&mut plan, &set, created, pred::INCLUDES, &includes)?;

        let current = if created {
            Vec::new()
        } else {
            self.query.relation_sources(pred::VERIFIES, &set)?
        };
        for component in verifiers.iter().filter(|c| !current.contains(*c)) {
            plan.push(Fact::relation(component.as_str(), pred::VERIFIES, set.as_str()));
        }
        Ok(plan)
    }
}
