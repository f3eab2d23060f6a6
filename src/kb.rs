//! The knowledge-base facade: the single entry point for callers.
//!
//! `KnowledgeBase` owns one connection and the query tool, enhancer and
//! replacer built on it. Every publish and replace runs its whole
//! read-check-write sequence under one write lock, so two writers in the same
//! process can never both see "not found" and mint duplicate nodes. Writers in
//! other processes are not covered; the store protocol offers no
//! compare-and-swap to build that on.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::config::KbConfig;
use crate::enhance::{
    ChannelRecord, ClassificationModelRecord, ComponentRecord, ComponentSetRecord,
    DiagnosisLogRecord, FaultPathRecord, KnowledgeEnhancer, SubComponentRecord,
    TroubleCodeRecord, Upserted, VehicleRecord,
};
use crate::error::{EnhanceResult, KbError, KbResult};
use crate::export::GraphExport;
use crate::fact::Fact;
use crate::graph::GraphConnection;
use crate::ident::EntityId;
use crate::query::GraphQueryTool;
use crate::replace::Replacer;
use crate::vocab::{EntityType, Namespace};

/// What one publish or replace did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Published {
    pub id: EntityId,
    /// Whether the entity was new.
    pub created: bool,
    pub inserted: usize,
    pub retracted: usize,
}

pub struct KnowledgeBase {
    config: KbConfig,
    connection: Arc<GraphConnection>,
    query: GraphQueryTool,
    enhancer: KnowledgeEnhancer,
    replacer: Replacer,
    write_lock: Mutex<()>,
}

impl KnowledgeBase {
    /// Validate the config and connect to the backend it selects.
    pub fn new(config: KbConfig) -> KbResult<Self> {
        config.validate()?;
        let connection = GraphConnection::from_config(&config)?;
        tracing::info!(
            base_url = %config.base_url,
            remote = connection.is_remote(),
            "knowledge base ready"
        );
        Ok(Self::with_connection(config, connection))
    }

    /// Build on an already constructed connection.
    pub fn with_connection(config: KbConfig, connection: GraphConnection) -> Self {
        let connection = Arc::new(connection);
        let query = GraphQueryTool::new(Arc::clone(&connection));
        Self {
            config,
            enhancer: KnowledgeEnhancer::new(query.clone()),
            replacer: Replacer::new(query.clone()),
            query,
            connection,
            write_lock: Mutex::new(()),
        }
    }

    /// Empty in-memory graph under the default namespace.
    pub fn in_memory() -> KbResult<Self> {
        let config = KbConfig::default();
        let connection = GraphConnection::in_memory(Namespace::new(config.namespace.clone()))?;
        Ok(Self::with_connection(config, connection))
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    pub fn query(&self) -> &GraphQueryTool {
        &self.query
    }

    pub fn connection(&self) -> &Arc<GraphConnection> {
        &self.connection
    }

    pub fn exists(&self, entity_type: EntityType, key: &str) -> KbResult<bool> {
        Ok(self.query.exists(entity_type, key)?)
    }

    pub fn export(&self) -> KbResult<GraphExport> {
        Ok(GraphExport::collect(&self.query)?)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a panic elsewhere leaves nothing torn.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Publish
    // -----------------------------------------------------------------------

    pub fn publish_trouble_code(&self, record: &TroubleCodeRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.trouble_code(record)?;
        self.commit(0, EntityType::TroubleCode, &record.code, plan)
    }

    pub fn publish_component(&self, record: &ComponentRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.component(record)?;
        self.commit(0, EntityType::SuspectComponent, &record.name, plan)
    }

    pub fn publish_subcomponent(&self, record: &SubComponentRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.subcomponent(record)?;
        self.commit(0, EntityType::SubComponent, &record.name, plan)
    }

    pub fn publish_component_set(&self, record: &ComponentSetRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.component_set(record)?;
        self.commit(0, EntityType::ComponentSet, &record.name, plan)
    }

    pub fn publish_vehicle(&self, record: &VehicleRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.vehicle(record)?;
        self.commit(0, EntityType::Vehicle, &record.vin, plan)
    }

    pub fn publish_fault_path(&self, record: &FaultPathRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.fault_path(record)?;
        self.commit(0, EntityType::FaultPath, &record.description, plan)
    }

    pub fn publish_model(&self, record: &ClassificationModelRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.classification_model(record)?;
        self.commit(0, EntityType::ClassificationModel, &record.model_id, plan)
    }

    pub fn publish_channel(&self, record: &ChannelRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.channel(record)?;
        self.commit(0, EntityType::Channel, &record.name, plan)
    }

    /// Record a diagnosis run. Always creates a new log.
    pub fn publish_diagnosis_log(&self, record: &DiagnosisLogRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let plan = self.enhancer.diagnosis_log(record)?;
        self.commit(0, EntityType::DiagnosisLog, &record.vin, plan)
    }

    // -----------------------------------------------------------------------
    // Replace (confirmed overwrite)
    // -----------------------------------------------------------------------

    /// Overwrite a trouble code with a corrected version.
    ///
    /// References of the new version are checked before anything is
    /// retracted. Stale links, associations and unshared fault conditions
    /// go; the identifier stays.
    pub fn replace_trouble_code(&self, record: &TroubleCodeRecord) -> KbResult<Published> {
        let _guard = self.lock();
        self.enhancer.validate_trouble_code(record)?;
        let stale = self.replacer.trouble_code_retractions(&record.code)?;
        self.replace_with(EntityType::TroubleCode, &record.code, stale, || {
            self.enhancer.trouble_code(record)
        })
    }

    pub fn replace_component(&self, record: &ComponentRecord) -> KbResult<Published> {
        let _guard = self.lock();
        self.enhancer.validate_component(record)?;
        let stale = self.replacer.component_retractions(&record.name)?;
        self.replace_with(EntityType::SuspectComponent, &record.name, stale, || {
            self.enhancer.component(record)
        })
    }

    pub fn replace_component_set(&self, record: &ComponentSetRecord) -> KbResult<Published> {
        let _guard = self.lock();
        self.enhancer.validate_component_set(record)?;
        let stale = self.replacer.component_set_retractions(&record.name)?;
        self.replace_with(EntityType::ComponentSet, &record.name, stale, || {
            self.enhancer.component_set(record)
        })
    }

    /// Overwrite a vehicle; properties left out of the record are cleared.
    pub fn replace_vehicle(&self, record: &VehicleRecord) -> KbResult<Published> {
        let _guard = self.lock();
        let stale = self.replacer.vehicle_retractions(&record.vin)?;
        self.replace_with(EntityType::Vehicle, &record.vin, stale, || {
            self.enhancer.vehicle(record)
        })
    }

    /// Retract `stale`, then plan and apply the new version.
    fn replace_with(
        &self,
        entity_type: EntityType,
        key: &str,
        stale: Vec<Fact>,
        plan: impl FnOnce() -> EnhanceResult<Upserted>,
    ) -> KbResult<Published> {
        let retracted = self.connection.delete(&stale)?;
        tracing::debug!(entity = %entity_type, key, retracted, "stale facts retracted");

        let plan = match plan() {
            Ok(plan) => plan,
            Err(e) if retracted > 0 => {
                return Err(partial(entity_type, key, "planning the new version", e.into()));
            }
            Err(e) => return Err(e.into()),
        };
        self.commit(retracted, entity_type, key, plan)
    }

    /// Apply a plan: retractions first, then one insert batch.
    ///
    /// `prior` counts facts already retracted earlier in the same operation.
    /// A failure after anything was retracted is reported as a partial
    /// application.
    fn commit(
        &self,
        prior: usize,
        entity_type: EntityType,
        key: &str,
        plan: Upserted,
    ) -> KbResult<Published> {
        let retracted = match self.connection.delete(&plan.retractions) {
            Ok(n) => prior + n,
            Err(e) if prior > 0 => {
                return Err(partial(entity_type, key, "retracting superseded values", e.into()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.connection.insert(&plan.facts) {
            if retracted == 0 {
                return Err(e.into());
            }
            return Err(partial(entity_type, key, "inserting the new version", e.into()));
        }

        tracing::info!(
            entity = %entity_type,
            key,
            id = %plan.id,
            created = plan.created,
            inserted = plan.facts.len(),
            retracted,
            "published"
        );
        Ok(Published {
            id: plan.id,
            created: plan.created,
            inserted: plan.facts.len(),
            retracted,
        })
    }
}

fn partial(entity_type: EntityType, key: &str, stage: &str, source: KbError) -> KbError {
    tracing::error!(entity = %entity_type, key, stage, "entity left partially applied");
    KbError::PartialApplication {
        entity: entity_type.class_name().to_string(),
        key: key.to_string(),
        stage: stage.to_string(),
        source: Box::new(source),
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("connection", &self.connection)
            .finish()
    }
}
