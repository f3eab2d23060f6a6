//! Vehicles, diagnosis runs, and oscillogram classification.

use crate::error::QueryResult;
use crate::ident::EntityId;
use crate::vocab::{pred, EntityType};

use super::rows::{ClassificationRow, HeatmapRow, StepRow, VehicleRow};
use super::{at_most_one, escape_literal, GraphQueryTool};

impl GraphQueryTool {
    pub fn vehicle_by_vin(&self, vin: &str) -> QueryResult<Option<EntityId>> {
        self.find_unique(EntityType::Vehicle, vin)
    }

    /// Properties of the vehicle with this VIN.
    pub fn vehicle_details(&self, vin: &str) -> QueryResult<Option<VehicleRow>> {
        let rows = self.rows(&format!(
            "SELECT ?id ?vin ?model ?hsn ?tsn WHERE {{\n\
             ?id rdf:type obd:Vehicle ; obd:VIN ?vin .\n\
             FILTER(STR(?vin) = \"{}\")\n\
             OPTIONAL {{ ?id obd:model ?model }}\n\
             OPTIONAL {{ ?id obd:HSN ?hsn }}\n\
             OPTIONAL {{ ?id obd:TSN ?tsn }}\n}}",
            escape_literal(vin)
        ))?;
        at_most_one(rows, "Vehicle", vin)
    }

    /// Diagnosis logs recorded for a vehicle, oldest first.
    pub fn logs_for_vehicle(&self, vin: &str) -> QueryResult<Vec<EntityId>> {
        self.ids(&format!(
            "SELECT ?id WHERE {{\n\
             ?v rdf:type obd:Vehicle ; obd:VIN ?vin .\n\
             FILTER(STR(?vin) = \"{}\")\n\
             ?id obd:createdFor ?v .\n\
             OPTIONAL {{ ?id obd:date ?date }}\n}}\n\
             ORDER BY ?date",
            escape_literal(vin)
        ))
    }

    /// Steps of a diagnosis run in `diagStep` order.
    pub fn log_steps(&self, log: &EntityId) -> QueryResult<Vec<StepRow>> {
        let mut steps: Vec<StepRow> = self.rows(&format!(
            "SELECT ?id ?type ?step ?prediction ?component WHERE {{\n\
             {} obd:entails ?id .\n\
             ?id rdf:type ?type ; obd:diagStep ?step .\n\
             FILTER(?type IN (obd:OscillogramClassification, obd:ManualInspection))\n\
             OPTIONAL {{ ?id obd:prediction ?prediction }}\n\
             OPTIONAL {{ ?id obd:checks ?c . ?c obd:component_name ?component }}\n}}\n\
             ORDER BY ?step",
            self.iri(log)
        ))?;
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    pub fn fault_path_of_log(&self, log: &EntityId) -> QueryResult<Option<String>> {
        let paths = self.keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n\
             {} obd:resultedIn ?path .\n\
             ?path obd:path_description ?key .\n}}",
            self.iri(log)
        ))?;
        at_most_one(paths, "FaultPath", log.as_str())
    }

    /// Codes read out at the start of a diagnosis run.
    pub fn codes_of_log(&self, log: &EntityId) -> QueryResult<Vec<String>> {
        let mut codes = self.keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n\
             ?dtc obd:appearsIn {} ;\n\
                  obd:code ?key .\n}}",
            self.iri(log)
        ))?;
        codes.sort();
        Ok(codes)
    }

    pub fn model_by_id(&self, model_id: &str) -> QueryResult<Option<EntityId>> {
        self.find_unique(EntityType::ClassificationModel, model_id)
    }

    pub fn channel_by_name(&self, name: &str) -> QueryResult<Option<EntityId>> {
        self.find_unique(EntityType::Channel, name)
    }

    pub fn classification_details(
        &self,
        classification: &EntityId,
    ) -> QueryResult<Option<ClassificationRow>> {
        let rows = self.rows(&format!(
            "SELECT ?id ?prediction ?uncertainty ?model ?oscillogram ?heatmap WHERE {{\n\
             VALUES ?id {{ {} }}\n\
             ?id rdf:type obd:OscillogramClassification ;\n\
                 obd:{prediction} ?prediction .\n\
             OPTIONAL {{ ?id obd:{uncertainty} ?uncertainty }}\n\
             OPTIONAL {{ ?id obd:usesModel ?m . ?m obd:model_id ?model }}\n\
             OPTIONAL {{ ?id obd:classifies ?oscillogram }}\n\
             OPTIONAL {{ ?id obd:produces ?heatmap }}\n}}",
            self.iri(classification),
            prediction = pred::PREDICTION,
            uncertainty = pred::UNCERTAINTY,
        ))?;
        at_most_one(rows, "OscillogramClassification", classification.as_str())
    }

    pub fn heatmap_of_classification(
        &self,
        classification: &EntityId,
    ) -> QueryResult<Option<HeatmapRow>> {
        let rows = self.rows(&format!(
            "SELECT ?id ?method ?values WHERE {{\n\
             {} obd:produces ?id .\n\
             ?id obd:generation_method ?method ;\n\
                 obd:generated_heatmap ?values .\n}}",
            self.iri(classification)
        ))?;
        at_most_one(rows, "Heatmap", classification.as_str())
    }
}
