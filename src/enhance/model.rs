//! Validated domain records handed in by callers (forms, scripts, the CLI).
//!
//! Natural keys are expected to be non-empty; references name other entities
//! by their natural key. `Option` fields on updatable entities mean "leave the
//! current value alone" when `None`.

use serde::{Deserialize, Serialize};

/// A diagnostic trouble code and its diagnostic knowledge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TroubleCodeRecord {
    pub code: String,
    pub code_type: Option<String>,
    /// Fault category description; created if unknown.
    pub category: Option<String>,
    /// Fault condition description; created if unknown.
    pub condition: Option<String>,
    /// Symptoms of the fault condition; created if unknown.
    pub symptoms: Vec<String>,
    /// Codes that must already exist.
    pub occurs_with: Vec<String>,
    /// Suspect component names in suggestion order. All must exist.
    pub suspect_components: Vec<String>,
    /// Component set the code is diagnosed in. Must exist.
    pub subsystem: Option<String>,
}

impl TroubleCodeRecord {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentRecord {
    pub name: String,
    pub use_oscilloscope: Option<bool>,
    /// Components that must already exist.
    pub affected_by: Vec<String>,
}

impl ComponentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubComponentRecord {
    pub name: String,
    /// Parent suspect component.
    pub part_of: String,
}

/// A vehicle subsystem grouping components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSetRecord {
    pub name: String,
    pub includes: Vec<String>,
    /// Components whose check verifies the whole set.
    pub verified_by: Vec<String>,
}

impl ComponentSetRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleRecord {
    pub vin: String,
    pub model: Option<String>,
    pub hsn: Option<String>,
    pub tsn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPathRecord {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationModelRecord {
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub name: String,
}

/// One recorded oscillogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillogramRecord {
    /// Finite values only.
    pub time_series: Vec<f64>,
    /// Measurement channel. Must exist.
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRecord {
    pub generation_method: String,
    /// Finite values only.
    pub values: Vec<f64>,
}

/// A model classifying an oscillogram of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStep {
    pub component: String,
    /// `true` means the component was classified as anomalous.
    pub prediction: bool,
    #[serde(default)]
    pub uncertainty: Option<f64>,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Component this result gave reason to inspect next.
    #[serde(default)]
    pub reason_for: Option<String>,
    pub oscillogram: OscillogramRecord,
    #[serde(default)]
    pub heatmap: Option<HeatmapRecord>,
    /// Steps of one log sharing a group were recorded in parallel.
    #[serde(default)]
    pub parallel_group: Option<u32>,
}

/// A component checked by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionStep {
    pub component: String,
    pub prediction: bool,
    #[serde(default)]
    pub reason_for: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticStep {
    Classification(ClassificationStep),
    Inspection(InspectionStep),
}

impl DiagnosticStep {
    pub fn component(&self) -> &str {
        match self {
            DiagnosticStep::Classification(s) => &s.component,
            DiagnosticStep::Inspection(s) => &s.component,
        }
    }

    pub fn reason_for(&self) -> Option<&str> {
        match self {
            DiagnosticStep::Classification(s) => s.reason_for.as_deref(),
            DiagnosticStep::Inspection(s) => s.reason_for.as_deref(),
        }
    }
}

/// One complete diagnosis run on a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisLogRecord {
    /// Vehicle the run was performed on. Must exist.
    pub vin: String,
    pub date: String,
    pub max_num_of_parallel_rec: u32,
    /// Codes read out at the start of the run. Must exist.
    pub codes: Vec<String>,
    /// Identified fault path; created if unknown.
    pub fault_path: Option<String>,
    pub steps: Vec<DiagnosticStep>,
}
