//! Fixed OBD ontology vocabulary: entity classes, predicates, and namespacing.
//!
//! Every fact the client emits uses one of the predicates below. Literal-valued
//! predicates carry a fixed [`Datatype`] so a later retraction can rebuild the
//! exact literal the store holds.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fact::Datatype;

/// `rdf:type`, passed through namespace resolution untouched.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Datatype of language-tagged string literals.
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// XML Schema namespace for literal datatypes.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Default ontology namespace.
pub const DEFAULT_NAMESPACE: &str = "http://www.semanticweb.org/diag_ontology#";

static ABSOLUTE_IRI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S+$").expect("static regex")
});

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Predicate local names, resolved against the ontology namespace.
pub mod pred {
    // Trouble codes
    pub const CODE: &str = "code";
    pub const CODE_TYPE: &str = "code_type";
    pub const OCCURS_WITH: &str = "occurs_with";
    pub const HAS_CATEGORY: &str = "hasCategory";
    pub const CATEGORY_DESCRIPTION: &str = "category_description";
    pub const REPRESENTS: &str = "represents";
    pub const CONDITION_DESCRIPTION: &str = "condition_description";
    pub const MANIFESTED_BY: &str = "manifestedBy";
    pub const SYMPTOM_DESCRIPTION: &str = "symptom_description";
    pub const HAS_ASSOCIATION: &str = "hasAssociation";
    pub const POINTS_TO: &str = "pointsTo";
    pub const PRIORITY_ID: &str = "priority_id";
    pub const AFFECTS: &str = "affects";

    // Components and subsystems
    pub const COMPONENT_NAME: &str = "component_name";
    pub const USE_OSCILLOSCOPE: &str = "use_oscilloscope";
    pub const AFFECTED_BY: &str = "affected_by";
    pub const INCLUDES: &str = "includes";
    pub const VERIFIES: &str = "verifies";
    pub const CONTAINS: &str = "contains";
    pub const SET_NAME: &str = "set_name";
    pub const PART_OF: &str = "partOf";

    // Vehicles
    pub const MODEL: &str = "model";
    pub const HSN: &str = "HSN";
    pub const TSN: &str = "TSN";
    pub const VIN: &str = "VIN";

    // Diagnosis runs
    pub const APPEARS_IN: &str = "appearsIn";
    pub const CREATED_FOR: &str = "createdFor";
    pub const DATE: &str = "date";
    pub const MAX_NUM_OF_PARALLEL_REC: &str = "max_num_of_parallel_rec";
    pub const ENTAILS: &str = "entails";
    pub const DIAG_STEP: &str = "diagStep";
    pub const RESULTED_IN: &str = "resultedIn";
    pub const PATH_DESCRIPTION: &str = "path_description";
    pub const CHECKS: &str = "checks";
    pub const PREDICTION: &str = "prediction";
    pub const LED_TO: &str = "ledTo";
    pub const REASON_FOR: &str = "reasonFor";

    // Oscillograms and classification
    pub const CLASSIFIES: &str = "classifies";
    pub const PRODUCES: &str = "produces";
    pub const UNCERTAINTY: &str = "uncertainty";
    pub const USES_MODEL: &str = "usesModel";
    pub const MODEL_ID: &str = "model_id";
    pub const GENERATION_METHOD: &str = "generation_method";
    pub const GENERATED_HEATMAP: &str = "generated_heatmap";
    pub const TIME_SERIES: &str = "time_series";
    pub const OVERLAYS: &str = "overlays";
    pub const RECORDED_ON: &str = "recordedOn";
    pub const CHANNEL_NAME: &str = "channel_name";
}

/// Literal datatype for a property predicate. Anything not listed is a plain string.
pub fn datatype_of(predicate: &str) -> Datatype {
    match predicate {
        pred::USE_OSCILLOSCOPE | pred::PREDICTION => Datatype::Boolean,
        pred::PRIORITY_ID | pred::DIAG_STEP | pred::MAX_NUM_OF_PARALLEL_REC => Datatype::Integer,
        pred::UNCERTAINTY => Datatype::Double,
        _ => Datatype::String,
    }
}

// ---------------------------------------------------------------------------
// Entity types
// ---------------------------------------------------------------------------

/// Every class of node the knowledge graph holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    TroubleCode,
    FaultCategory,
    FaultCondition,
    Symptom,
    SuspectComponent,
    SubComponent,
    DiagnosticAssociation,
    ComponentSet,
    Vehicle,
    DiagnosisLog,
    Oscillogram,
    OscillogramClassification,
    ManualInspection,
    Heatmap,
    FaultPath,
    ParallelRecordingSet,
    Channel,
    ClassificationModel,
}

impl EntityType {
    pub const ALL: [EntityType; 18] = [
        EntityType::TroubleCode,
        EntityType::FaultCategory,
        EntityType::FaultCondition,
        EntityType::Symptom,
        EntityType::SuspectComponent,
        EntityType::SubComponent,
        EntityType::DiagnosticAssociation,
        EntityType::ComponentSet,
        EntityType::Vehicle,
        EntityType::DiagnosisLog,
        EntityType::Oscillogram,
        EntityType::OscillogramClassification,
        EntityType::ManualInspection,
        EntityType::Heatmap,
        EntityType::FaultPath,
        EntityType::ParallelRecordingSet,
        EntityType::Channel,
        EntityType::ClassificationModel,
    ];

    /// Class local name in the ontology.
    pub fn class_name(self) -> &'static str {
        match self {
            EntityType::TroubleCode => "TroubleCode",
            EntityType::FaultCategory => "FaultCategory",
            EntityType::FaultCondition => "FaultCondition",
            EntityType::Symptom => "Symptom",
            EntityType::SuspectComponent => "SuspectComponent",
            EntityType::SubComponent => "SubComponent",
            EntityType::DiagnosticAssociation => "DiagnosticAssociation",
            EntityType::ComponentSet => "ComponentSet",
            EntityType::Vehicle => "Vehicle",
            EntityType::DiagnosisLog => "DiagnosisLog",
            EntityType::Oscillogram => "Oscillogram",
            EntityType::OscillogramClassification => "OscillogramClassification",
            EntityType::ManualInspection => "ManualInspection",
            EntityType::Heatmap => "Heatmap",
            EntityType::FaultPath => "FaultPath",
            EntityType::ParallelRecordingSet => "ParallelRecordingSet",
            EntityType::Channel => "Channel",
            EntityType::ClassificationModel => "ClassificationModel",
        }
    }

    /// Prefix of minted identifiers (`<prefix>_<hex>`).
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityType::TroubleCode => "dtc",
            EntityType::FaultCategory => "fault_cat",
            EntityType::FaultCondition => "fault_cond",
            EntityType::Symptom => "symptom",
            EntityType::SuspectComponent => "comp",
            EntityType::SubComponent => "sub_comp",
            EntityType::DiagnosticAssociation => "diag_association",
            EntityType::ComponentSet => "comp_set",
            EntityType::Vehicle => "vehicle",
            EntityType::DiagnosisLog => "diag_log",
            EntityType::Oscillogram => "osci",
            EntityType::OscillogramClassification => "osci_classification",
            EntityType::ManualInspection => "manual_inspection",
            EntityType::Heatmap => "heatmap",
            EntityType::FaultPath => "fault_path",
            EntityType::ParallelRecordingSet => "parallel_rec_set",
            EntityType::Channel => "channel",
            EntityType::ClassificationModel => "model",
        }
    }

    /// The property whose literal is this type's real-world identity.
    ///
    /// `None` for event-like types: every publish creates a fresh node.
    pub fn natural_key(self) -> Option<&'static str> {
        match self {
            EntityType::TroubleCode => Some(pred::CODE),
            EntityType::FaultCategory => Some(pred::CATEGORY_DESCRIPTION),
            EntityType::FaultCondition => Some(pred::CONDITION_DESCRIPTION),
            EntityType::Symptom => Some(pred::SYMPTOM_DESCRIPTION),
            EntityType::SuspectComponent | EntityType::SubComponent => Some(pred::COMPONENT_NAME),
            EntityType::ComponentSet => Some(pred::SET_NAME),
            EntityType::Vehicle => Some(pred::VIN),
            EntityType::FaultPath => Some(pred::PATH_DESCRIPTION),
            EntityType::Channel => Some(pred::CHANNEL_NAME),
            EntityType::ClassificationModel => Some(pred::MODEL_ID),
            EntityType::DiagnosticAssociation
            | EntityType::DiagnosisLog
            | EntityType::Oscillogram
            | EntityType::OscillogramClassification
            | EntityType::ManualInspection
            | EntityType::Heatmap
            | EntityType::ParallelRecordingSet => None,
        }
    }

    /// Reverse of [`class_name`](Self::class_name).
    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.class_name() == name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// The ontology namespace every local name is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `term` is already an absolute IRI.
    pub fn is_absolute(term: &str) -> bool {
        ABSOLUTE_IRI.is_match(term)
    }

    /// Resolve a triple element to a full IRI.
    ///
    /// Absolute IRIs and `rdf:type` pass through; anything else is placed under
    /// the ontology prefix.
    pub fn resolve(&self, term: &str) -> String {
        if term == "rdf:type" {
            RDF_TYPE.to_string()
        } else if Self::is_absolute(term) {
            term.to_string()
        } else {
            format!("{}{term}", self.prefix)
        }
    }

    /// Strip the ontology prefix from an IRI. Foreign IRIs come back unchanged.
    pub fn local_name<'a>(&self, iri: &'a str) -> &'a str {
        iri.strip_prefix(self.prefix.as_str()).unwrap_or(iri)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_namespaces_local_names() {
        let ns = Namespace::default();
        assert_eq!(
            ns.resolve("dtc_abc"),
            format!("{DEFAULT_NAMESPACE}dtc_abc")
        );
        assert_eq!(ns.resolve("rdf:type"), RDF_TYPE);
        assert_eq!(ns.resolve(RDF_TYPE), RDF_TYPE);
        assert_eq!(ns.resolve("urn:obd:x"), "urn:obd:x");
        assert_eq!(ns.resolve("mailto:workshop@example.org"), "mailto:workshop@example.org");
        assert_eq!(ns.resolve("tag:obd,2024:P0301"), "tag:obd,2024:P0301");
    }

    #[test]
    fn local_name_strips_only_own_prefix() {
        let ns = Namespace::default();
        let iri = ns.resolve("comp_1f");
        assert_eq!(ns.local_name(&iri), "comp_1f");
        assert_eq!(ns.local_name(RDF_TYPE), RDF_TYPE);
    }

    #[test]
    fn natural_keys_cover_identity_types() {
        assert_eq!(EntityType::TroubleCode.natural_key(), Some(pred::CODE));
        assert_eq!(EntityType::Vehicle.natural_key(), Some(pred::VIN));
        assert_eq!(EntityType::DiagnosticAssociation.natural_key(), None);
        assert_eq!(EntityType::DiagnosisLog.natural_key(), None);
    }

    #[test]
    fn class_names_round_trip() {
        for t in EntityType::ALL {
            assert_eq!(EntityType::from_class_name(t.class_name()), Some(t));
        }
    }

    #[test]
    fn datatypes_follow_predicates() {
        assert_eq!(datatype_of(pred::PRIORITY_ID), Datatype::Integer);
        assert_eq!(datatype_of(pred::USE_OSCILLOSCOPE), Datatype::Boolean);
        assert_eq!(datatype_of(pred::UNCERTAINTY), Datatype::Double);
        assert_eq!(datatype_of(pred::CODE), Datatype::String);
    }
}
