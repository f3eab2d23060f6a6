use std::collections::HashMap;

use crate::error::{EnhanceError, EnhanceResult};
use crate::fact::Fact;
use crate::ident::EntityId;
use crate::vocab::{pred, EntityType};

use super::{ClassificationStep, DiagnosisLogRecord, DiagnosticStep, KnowledgeEnhancer, Upserted};

/// Existing entities a step refers to, resolved before anything is planned.
struct StepTargets {
    checks: EntityId,
    reason_for: Option<EntityId>,
    model: Option<EntityId>,
    channel: Option<EntityId>,
}

fn json_array(values: &[f64]) -> String {
    serde_json::Value::from(values).to_string()
}

fn check_finite(field: &str, values: &[f64]) -> EnhanceResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(index) => Err(EnhanceError::NonFinite {
            field: field.to_string(),
            index,
            value: values[index],
        }),
    }
}

impl KnowledgeEnhancer {
    fn step_targets(&self, step: &DiagnosticStep) -> EnhanceResult<StepTargets> {
        let checks = self.require(pred::CHECKS, EntityType::SuspectComponent, step.component())?;
        let reason_for = step
            .reason_for()
            .map(|name| self.require(pred::REASON_FOR, EntityType::SuspectComponent, name))
            .transpose()?;
        if let DiagnosticStep::Classification(c) = step {
            check_finite("time_series", &c.oscillogram.time_series)?;
            if let Some(ref heatmap) = c.heatmap {
                check_finite("heatmap", &heatmap.values)?;
            }
        }
        let (model, channel) = match step {
            DiagnosticStep::Classification(c) => (
                c.model_id
                    .as_deref()
                    .map(|m| self.require(pred::USES_MODEL, EntityType::ClassificationModel, m))
                    .transpose()?,
                c.oscillogram
                    .channel
                    .as_deref()
                    .map(|ch| self.require(pred::RECORDED_ON, EntityType::Channel, ch))
                    .transpose()?,
            ),
            DiagnosticStep::Inspection(_) => (None, None),
        };
        Ok(StepTargets {
            checks,
            reason_for,
            model,
            channel,
        })
    }

    /// Plan a complete diagnosis run.
    ///
    /// Logs have no natural key, so every call mints a new log with new
    /// steps. The vehicle, codes, checked components, models and channels
    /// must exist; the fault path is created when unknown. Steps are numbered
    /// in order and chained with `ledTo`.
    pub fn diagnosis_log(&self, record: &DiagnosisLogRecord) -> EnhanceResult<Upserted> {
        let vehicle = self.require(pred::CREATED_FOR, EntityType::Vehicle, &record.vin)?;
        let codes = self.require_all(pred::APPEARS_IN, EntityType::TroubleCode, &record.codes)?;
        let targets = record
            .steps
            .iter()
            .map(|s| self.step_targets(s))
            .collect::<EnhanceResult<Vec<_>>>()?;

        let mut plan = Upserted::minted(EntityType::DiagnosisLog);
        let log = plan.id.clone();
        plan.push(Fact::relation(log.as_str(), pred::CREATED_FOR, vehicle.as_str()));
        plan.push(Fact::property(log.as_str(), pred::DATE, record.date.as_str()));
        plan.push(Fact::property(
            log.as_str(),
            pred::MAX_NUM_OF_PARALLEL_REC,
            record.max_num_of_parallel_rec.to_string(),
        ));
        for dtc in &codes {
            plan.push(Fact::relation(dtc.as_str(), pred::APPEARS_IN, log.as_str()));
        }
        if let Some(ref description) = record.fault_path {
            let path = self.lookup_or_mint(EntityType::FaultPath, description)?;
            plan.push(Fact::relation(log.as_str(), pred::RESULTED_IN, path.id.as_str()));
            plan.absorb(path);
        }

        let mut groups: HashMap<u32, EntityId> = HashMap::new();
        let mut previous: Option<EntityId> = None;
        for (index, (step, refs)) in record.steps.iter().zip(&targets).enumerate() {
            let (step_plan, prediction) = match step {
                DiagnosticStep::Classification(c) => {
                    (plan_classification(c, refs, &mut groups), c.prediction)
                }
                DiagnosticStep::Inspection(i) => {
                    (Upserted::minted(EntityType::ManualInspection), i.prediction)
                }
            };
            let id = step_plan.id.clone();
            plan.absorb(step_plan);
            plan.push(Fact::relation(log.as_str(), pred::ENTAILS, id.as_str()));
            plan.push(Fact::property(id.as_str(), pred::DIAG_STEP, index.to_string()));
            plan.push(Fact::property(id.as_str(), pred::PREDICTION, prediction.to_string()));
            plan.push(Fact::relation(id.as_str(), pred::CHECKS, refs.checks.as_str()));
            if let Some(ref next) = refs.reason_for {
                plan.push(Fact::relation(id.as_str(), pred::REASON_FOR, next.as_str()));
            }
            if let Some(prev) = previous.replace(id.clone()) {
                plan.push(Fact::relation(prev.as_str(), pred::LED_TO, id.as_str()));
            }
        }

        Ok(plan)
    }
}

/// Classification node plus its oscillogram, heatmap and recording set.
fn plan_classification(
    step: &ClassificationStep,
    refs: &StepTargets,
    groups: &mut HashMap<u32, EntityId>,
) -> Upserted {
    let mut plan = Upserted::minted(EntityType::OscillogramClassification);
    let id = plan.id.clone();

    let osci = Upserted::minted(EntityType::Oscillogram);
    let osci_id = osci.id.clone();
    plan.absorb(osci);
    plan.push(Fact::relation(id.as_str(), pred::CLASSIFIES, osci_id.as_str()));
    plan.push(Fact::property(
        osci_id.as_str(),
        pred::TIME_SERIES,
        json_array(&step.oscillogram.time_series),
    ));
    if let Some(ref channel) = refs.channel {
        plan.push(Fact::relation(osci_id.as_str(), pred::RECORDED_ON, channel.as_str()));
    }
    if let Some(group) = step.parallel_group {
        let set = match groups.get(&group) {
            Some(set) => set.clone(),
            None => {
                let set = Upserted::minted(EntityType::ParallelRecordingSet);
                let set_id = set.id.clone();
                plan.absorb(set);
                groups.insert(group, set_id.clone());
                set_id
            }
        };
        plan.push(Fact::relation(osci_id.as_str(), pred::PART_OF, set.as_str()));
    }

    if let Some(uncertainty) = step.uncertainty {
        plan.push(Fact::property(id.as_str(), pred::UNCERTAINTY, uncertainty.to_string()));
    }
    if let Some(ref model) = refs.model {
        plan.push(Fact::relation(id.as_str(), pred::USES_MODEL, model.as_str()));
    }
    if let Some(ref heatmap) = step.heatmap {
        let hm = Upserted::minted(EntityType::Heatmap);
        let hm_id = hm.id.clone();
        plan.absorb(hm);
        plan.push(Fact::relation(id.as_str(), pred::PRODUCES, hm_id.as_str()));
        plan.push(Fact::property(
            hm_id.as_str(),
            pred::GENERATION_METHOD,
            heatmap.generation_method.as_str(),
        ));
        plan.push(Fact::property(
            hm_id.as_str(),
            pred::GENERATED_HEATMAP,
            json_array(&heatmap.values),
        ));
        plan.push(Fact::relation(hm_id.as_str(), pred::OVERLAYS, osci_id.as_str()));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enhance::tests::{apply, enhancer};
    use crate::enhance::{
        ChannelRecord, ClassificationModelRecord, ComponentRecord, HeatmapRecord, InspectionStep,
        OscillogramRecord, TroubleCodeRecord, VehicleRecord,
    };

    fn seed(enhancer: &KnowledgeEnhancer) {
        for name in ["Lambda sensor", "Injector"] {
            apply(enhancer, &enhancer.component(&ComponentRecord::new(name)).unwrap());
        }
        apply(enhancer, &enhancer.trouble_code(&TroubleCodeRecord::new("P0130")).unwrap());
        apply(
            enhancer,
            &enhancer
                .vehicle(&VehicleRecord {
                    vin: "VIN1".into(),
                    ..VehicleRecord::default()
                })
                .unwrap(),
        );
        apply(
            enhancer,
            &enhancer
                .classification_model(&ClassificationModelRecord {
                    model_id: "fcn-v1".into(),
                })
                .unwrap(),
        );
        apply(
            enhancer,
            &enhancer
                .channel(&ChannelRecord {
                    name: "CH A".into(),
                })
                .unwrap(),
        );
    }

    fn record() -> DiagnosisLogRecord {
        DiagnosisLogRecord {
            vin: "VIN1".into(),
            date: "2024-03-01".into(),
            max_num_of_parallel_rec: 2,
            codes: vec!["P0130".into()],
            fault_path: Some("Lambda sensor -> Injector".into()),
            steps: vec![
                DiagnosticStep::Classification(ClassificationStep {
                    component: "Lambda sensor".into(),
                    prediction: true,
                    uncertainty: Some(0.25),
                    model_id: Some("fcn-v1".into()),
                    reason_for: Some("Injector".into()),
                    oscillogram: OscillogramRecord {
                        time_series: vec![0.1, 0.4, 0.2],
                        channel: Some("CH A".into()),
                    },
                    heatmap: Some(HeatmapRecord {
                        generation_method: "gradcam".into(),
                        values: vec![0.0, 1.0, 0.5],
                    }),
                    parallel_group: Some(0),
                }),
                DiagnosticStep::Inspection(InspectionStep {
                    component: "Injector".into(),
                    prediction: false,
                    reason_for: None,
                }),
            ],
        }
    }

    #[test]
    fn log_round_trips_through_queries() {
        let enhancer = enhancer();
        seed(&enhancer);
        let plan = enhancer.diagnosis_log(&record()).unwrap();
        apply(&enhancer, &plan);

        let q = enhancer.query();
        assert_eq!(q.logs_for_vehicle("VIN1").unwrap(), vec![plan.id.clone()]);
        assert_eq!(q.codes_of_log(&plan.id).unwrap(), vec!["P0130"]);
        assert_eq!(
            q.fault_path_of_log(&plan.id).unwrap().as_deref(),
            Some("Lambda sensor -> Injector")
        );

        let steps = q.log_steps(&plan.id).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].component.as_deref(), Some("Lambda sensor"));
        assert_eq!(steps[1].prediction, Some(false));

        let details = q.classification_details(&steps[0].id).unwrap().unwrap();
        assert_eq!(details.model_id.as_deref(), Some("fcn-v1"));
        assert_eq!(details.uncertainty, Some(0.25));
        let heatmap = q.heatmap_of_classification(&steps[0].id).unwrap().unwrap();
        assert_eq!(heatmap.values, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn every_log_is_new() {
        let enhancer = enhancer();
        seed(&enhancer);
        let a = enhancer.diagnosis_log(&record()).unwrap();
        apply(&enhancer, &a);
        let b = enhancer.diagnosis_log(&record()).unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.created);
    }

    #[test]
    fn unknown_vehicle_is_rejected() {
        let enhancer = enhancer();
        seed(&enhancer);
        let mut rec = record();
        rec.vin = "UNKNOWN".into();
        assert!(matches!(
            enhancer.diagnosis_log(&rec).unwrap_err(),
            EnhanceError::IntegrityViolation { .. }
        ));
    }

    #[test]
    fn non_finite_heatmap_plans_nothing() {
        let enhancer = enhancer();
        seed(&enhancer);
        let mut rec = record();
        if let DiagnosticStep::Classification(ref mut c) = rec.steps[0] {
            c.heatmap = Some(HeatmapRecord {
                generation_method: "gradcam".into(),
                values: vec![0.0, f64::NAN],
            });
        }
        let err = enhancer.diagnosis_log(&rec).unwrap_err();
        assert!(matches!(
            err,
            EnhanceError::NonFinite { ref field, index: 1, .. } if field == "heatmap"
        ));
        assert!(enhancer.query().logs_for_vehicle("VIN1").unwrap().is_empty());
    }
}
