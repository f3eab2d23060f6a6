//! End-to-end tests for the knowledge-base facade.
//!
//! These run against the local oxigraph backend and exercise the full
//! publish / query / replace cycle through the same API the CLI and form
//! layers use.

use std::sync::Arc;

use obd_knowledge::config::KbConfig;
use obd_knowledge::enhance::{
    ComponentRecord, ComponentSetRecord, TroubleCodeRecord, VehicleRecord,
};
use obd_knowledge::error::{EnhanceError, KbError, QueryError};
use obd_knowledge::fact::Fact;
use obd_knowledge::ident::EntityId;
use obd_knowledge::kb::KnowledgeBase;
use obd_knowledge::vocab::{pred, EntityType};

fn kb() -> KnowledgeBase {
    KnowledgeBase::in_memory().unwrap()
}

fn components(kb: &KnowledgeBase, names: &[&str]) {
    for name in names {
        kb.publish_component(&ComponentRecord::new(*name)).unwrap();
    }
}

fn code_with_suspects(code: &str, suspects: &[&str]) -> TroubleCodeRecord {
    let mut record = TroubleCodeRecord::new(code);
    record.suspect_components = suspects.iter().map(|s| s.to_string()).collect();
    record
}

fn suspect_names(kb: &KnowledgeBase, code: &str) -> Vec<String> {
    kb.query()
        .suspect_components(code)
        .unwrap()
        .into_iter()
        .map(|r| r.component_name)
        .collect()
}

#[test]
fn republishing_keeps_one_node_and_no_duplicate_facts() {
    let kb = kb();
    components(&kb, &["Ignition coil"]);
    let mut record = code_with_suspects("P0301", &["Ignition coil"]);
    record.code_type = Some("generic".into());
    record.category = Some("Powertrain".into());
    record.condition = Some("Misfire cylinder 1".into());
    record.symptoms = vec!["Rough idle".into()];

    let first = kb.publish_trouble_code(&record).unwrap();
    let statements = kb.query().all_statements().unwrap().len();
    let second = kb.publish_trouble_code(&record).unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.retracted, 0);
    assert_eq!(kb.query().all_statements().unwrap().len(), statements);
    assert_eq!(
        kb.query()
            .entity_by_key(EntityType::TroubleCode, "P0301")
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn missing_affected_by_target_is_rejected() {
    let kb = kb();
    let mut record = ComponentRecord::new("Sensor2");
    record.affected_by = vec!["Sensor1".into()];

    let err = kb.publish_component(&record).unwrap_err();
    assert!(matches!(
        err,
        KbError::Enhance(EnhanceError::IntegrityViolation { ref relation, ref target, .. })
            if relation == pred::AFFECTED_BY && target == "Sensor1"
    ));
    assert!(!kb.exists(EntityType::SuspectComponent, "Sensor2").unwrap());
    assert!(kb.query().all_statements().unwrap().is_empty());
}

#[test]
fn suspect_priority_round_trip_without_pruning() {
    let kb = kb();
    components(&kb, &["A", "B", "C"]);
    kb.publish_trouble_code(&code_with_suspects("P0171", &["A", "B", "C"]))
        .unwrap();
    assert_eq!(suspect_names(&kb, "P0171"), vec!["A", "B", "C"]);

    // Fewer components without a confirmed overwrite: nothing is pruned.
    kb.publish_trouble_code(&code_with_suspects("P0171", &["A", "B"]))
        .unwrap();
    assert_eq!(suspect_names(&kb, "P0171"), vec!["A", "B", "C"]);
    let priorities: Vec<u32> = kb
        .query()
        .suspect_components("P0171")
        .unwrap()
        .iter()
        .map(|r| r.priority)
        .collect();
    assert_eq!(priorities, vec![0, 1, 2]);
}

#[test]
fn replace_removes_exactly_the_stale_condition() {
    let kb = kb();
    let mut record = TroubleCodeRecord::new("P0301");
    record.condition = Some("Misfire cylinder 1".into());
    let original = kb.publish_trouble_code(&record).unwrap();

    record.condition = Some("Misfire cylinder 2".into());
    let replaced = kb.replace_trouble_code(&record).unwrap();
    assert_eq!(replaced.id, original.id);
    assert!(replaced.retracted > 0);

    let condition = kb.query().condition_of_code("P0301").unwrap().unwrap();
    assert_eq!(condition.key, "Misfire cylinder 2");
    assert!(kb
        .query()
        .entity_by_key(EntityType::FaultCondition, "Misfire cylinder 1")
        .unwrap()
        .is_empty());
    assert_eq!(
        kb.query().all_of_type(EntityType::FaultCondition).unwrap().len(),
        1
    );
}

#[test]
fn replace_keeps_condition_shared_with_another_code() {
    let kb = kb();
    for code in ["P0300", "P0301"] {
        let mut record = TroubleCodeRecord::new(code);
        record.condition = Some("Random misfire".into());
        record.symptoms = vec!["Engine shakes".into()];
        kb.publish_trouble_code(&record).unwrap();
    }

    let mut corrected = TroubleCodeRecord::new("P0301");
    corrected.condition = Some("Misfire cylinder 1".into());
    kb.replace_trouble_code(&corrected).unwrap();

    let shared = kb.query().condition_of_code("P0300").unwrap().unwrap();
    assert_eq!(shared.key, "Random misfire");
    let symptoms = kb.query().symptoms_of_code("P0300").unwrap();
    assert_eq!(symptoms.len(), 1);
}

#[test]
fn contains_edge_is_reference_counted() {
    let kb = kb();
    components(&kb, &["X"]);
    kb.publish_component_set(&ComponentSetRecord::new("S")).unwrap();
    for code in ["P0100", "P0101"] {
        let mut record = code_with_suspects(code, &["X"]);
        record.subsystem = Some("S".into());
        kb.publish_trouble_code(&record).unwrap();
    }
    assert_eq!(kb.query().set_contains("S").unwrap(), vec!["X"]);

    // First code no longer points at X: the second still justifies the edge.
    kb.replace_trouble_code(&TroubleCodeRecord::new("P0100"))
        .unwrap();
    assert_eq!(kb.query().set_contains("S").unwrap(), vec!["X"]);
    assert!(kb.query().suspect_components("P0100").unwrap().is_empty());

    // Second one gone too: nothing justifies it anymore.
    kb.replace_trouble_code(&TroubleCodeRecord::new("P0101"))
        .unwrap();
    assert!(kb.query().set_contains("S").unwrap().is_empty());
}

#[test]
fn one_association_per_code_component_pair() {
    let kb = kb();
    components(&kb, &["Thermostat"]);
    let record = code_with_suspects("P0128", &["Thermostat"]);
    kb.publish_trouble_code(&record).unwrap();
    kb.publish_trouble_code(&record).unwrap();

    let rows = kb.query().suspect_components("P0128").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].priority, 0);
    assert_eq!(
        kb.query()
            .all_of_type(EntityType::DiagnosticAssociation)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn end_to_end_sensor_scenario() {
    let kb = kb();
    kb.publish_component(&ComponentRecord::new("Sensor1")).unwrap();
    let mut sensor2 = ComponentRecord::new("Sensor2");
    sensor2.affected_by = vec!["Sensor1".into()];
    kb.publish_component(&sensor2).unwrap();

    kb.publish_trouble_code(&code_with_suspects("P1234", &["Sensor1", "Sensor2"]))
        .unwrap();

    assert_eq!(suspect_names(&kb, "P1234"), vec!["Sensor1", "Sensor2"]);
    assert_eq!(kb.query().affected_by("Sensor2").unwrap(), vec!["Sensor1"]);
}

#[test]
fn duplicate_natural_keys_are_reported_not_guessed() {
    let kb = kb();
    for id in ["dtc_dup_a", "dtc_dup_b"] {
        let id = EntityId::new(id);
        kb.connection()
            .insert(&[
                Fact::typed(&id, EntityType::TroubleCode),
                Fact::property(id.as_str(), pred::CODE, "P0420"),
            ])
            .unwrap();
    }
    let err = kb
        .publish_trouble_code(&TroubleCodeRecord::new("P0420"))
        .unwrap_err();
    assert!(matches!(
        err,
        KbError::Enhance(EnhanceError::Query(QueryError::AmbiguousMatch { count: 2, .. }))
    ));
}

#[test]
fn concurrent_publishers_in_one_process_mint_once() {
    let kb = Arc::new(kb());
    std::thread::scope(|scope| {
        for _ in 0..8 {
            let kb = Arc::clone(&kb);
            scope.spawn(move || {
                kb.publish_component(&ComponentRecord::new("Battery")).unwrap();
            });
        }
    });
    assert_eq!(
        kb.query()
            .entity_by_key(EntityType::SuspectComponent, "Battery")
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn static_graph_file_serves_lookups() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("seed.ttl");
    std::fs::write(
        &path,
        r#"@prefix obd: <http://www.semanticweb.org/diag_ontology#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .

obd:dtc_1 rdf:type obd:TroubleCode ; obd:code "P0420" .
obd:dtc_2 rdf:type obd:TroubleCode ; obd:code "P0171" ; obd:occurs_with obd:dtc_1 .
"#,
    )
    .unwrap();

    let kb = KnowledgeBase::new(KbConfig {
        graph_file: Some(path),
        ..Default::default()
    })
    .unwrap();
    assert!(!kb.connection().is_remote());
    assert_eq!(kb.query().all_codes().unwrap(), vec!["P0171", "P0420"]);
    assert_eq!(
        kb.query().co_occurring_codes("P0171").unwrap(),
        vec!["P0420"]
    );
}

#[test]
fn replace_retracts_foreign_literals_exactly() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("seed.ttl");
    std::fs::write(
        &path,
        r#"@prefix obd: <http://www.semanticweb.org/diag_ontology#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

obd:comp_1 rdf:type obd:SuspectComponent ; obd:component_name "MAF sensor" .
obd:dtc_1 rdf:type obd:TroubleCode ; obd:code "P0100" ; obd:hasAssociation obd:da_1 .
obd:da_1 rdf:type obd:DiagnosticAssociation ; obd:pointsTo obd:comp_1 ;
    obd:priority_id "0"^^xsd:int .
obd:vehicle_1 rdf:type obd:Vehicle ; obd:VIN "VIN1" ; obd:model "Golf"@de .
"#,
    )
    .unwrap();
    let kb = KnowledgeBase::new(KbConfig {
        graph_file: Some(path),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(suspect_names(&kb, "P0100"), vec!["MAF sensor"]);

    let replaced = kb
        .replace_trouble_code(&TroubleCodeRecord::new("P0100"))
        .unwrap();
    assert_eq!(replaced.retracted, 4);
    assert!(suspect_names(&kb, "P0100").is_empty());
    assert!(kb
        .query()
        .outgoing_facts(&EntityId::new("da_1"))
        .unwrap()
        .is_empty());

    kb.replace_vehicle(&VehicleRecord {
        vin: "VIN1".into(),
        model: Some("Polo".into()),
        ..VehicleRecord::default()
    })
    .unwrap();
    let models = kb
        .query()
        .property_values(&EntityId::new("vehicle_1"), pred::MODEL)
        .unwrap();
    assert_eq!(models, vec!["Polo"]);
}

#[test]
fn replace_component_swaps_affected_by_and_clears_flag() {
    let kb = kb();
    components(&kb, &["S1", "S3"]);
    let mut record = ComponentRecord::new("S2");
    record.affected_by = vec!["S1".into()];
    record.use_oscilloscope = Some(true);
    let first = kb.publish_component(&record).unwrap();
    assert_eq!(kb.query().uses_oscilloscope("S2").unwrap(), Some(true));

    let mut corrected = ComponentRecord::new("S2");
    corrected.affected_by = vec!["S3".into()];
    let replaced = kb.replace_component(&corrected).unwrap();

    assert_eq!(replaced.id, first.id);
    assert!(!replaced.created);
    assert_eq!(replaced.retracted, 2);
    assert_eq!(replaced.inserted, 1);
    assert_eq!(kb.query().affected_by("S2").unwrap(), vec!["S3"]);
    assert_eq!(kb.query().uses_oscilloscope("S2").unwrap(), None);
    assert!(kb.query().components_affected_by("S1").unwrap().is_empty());
}

#[test]
fn export_lists_entities_with_keys() {
    let kb = kb();
    components(&kb, &["B", "A"]);
    kb.publish_trouble_code(&code_with_suspects("P0001", &["A"]))
        .unwrap();

    let export = kb.export().unwrap();
    assert_eq!(export.count(EntityType::SuspectComponent), 2);
    assert_eq!(export.count(EntityType::DiagnosticAssociation), 1);
    let keys: Vec<_> = export
        .entities
        .iter()
        .filter(|e| e.entity_type == EntityType::SuspectComponent)
        .filter_map(|e| e.key.clone())
        .collect();
    assert_eq!(keys, vec!["A", "B"]);
    assert!(!export.statements.is_empty());
}
