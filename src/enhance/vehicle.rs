use crate::error::EnhanceResult;
use crate::fact::Fact;
use crate::vocab::{pred, EntityType};

use super::{
    ChannelRecord, ClassificationModelRecord, FaultPathRecord, KnowledgeEnhancer, Upserted,
    VehicleRecord,
};

impl KnowledgeEnhancer {
    /// Plan the upsert of a vehicle. Supplied properties replace current ones.
    pub fn vehicle(&self, record: &VehicleRecord) -> EnhanceResult<Upserted> {
        let mut plan = self.lookup_or_mint(EntityType::Vehicle, &record.vin)?;
        let id = plan.id.clone();
        for (predicate, value) in [
            (pred::MODEL, &record.model),
            (pred::HSN, &record.hsn),
            (pred::TSN, &record.tsn),
        ] {
            if let Some(value) = value {
                self.set_single(&mut plan, Fact::property(id.as_str(), predicate, value.as_str()))?;
            }
        }
        Ok(plan)
    }

    pub fn fault_path(&self, record: &FaultPathRecord) -> EnhanceResult<Upserted> {
        self.lookup_or_mint(EntityType::FaultPath, &record.description)
    }

    pub fn classification_model(&self, record: &ClassificationModelRecord) -> EnhanceResult<Upserted> {
        self.lookup_or_mint(EntityType::ClassificationModel, &record.model_id)
    }

    pub fn channel(&self, record: &ChannelRecord) -> EnhanceResult<Upserted> {
        self.lookup_or_mint(EntityType::Channel, &record.name)
    }
}
