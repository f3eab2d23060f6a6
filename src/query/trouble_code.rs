//! Trouble-code lookups: category, fault condition, symptoms, co-occurrence,
//! and the prioritised suspect-component list.

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::ident::EntityId;
use crate::vocab::{pred, EntityType};

use super::rows::{AssociationRow, EntityKeyRow};
use super::{at_most_one, escape_literal, GraphQueryTool};

/// Everything the graph knows about one trouble code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroubleCodeSummary {
    pub id: EntityId,
    pub code: String,
    pub code_type: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub symptoms: Vec<String>,
    pub occurs_with: Vec<String>,
    /// Sorted by priority.
    pub suspects: Vec<AssociationRow>,
    pub subsystems: Vec<String>,
}

/// Graph pattern binding `?dtc` to the trouble code with this code.
fn code_anchor(code: &str) -> String {
    format!(
        "?dtc rdf:type obd:TroubleCode ; obd:code ?code .\n\
         FILTER(STR(?code) = \"{}\")\n",
        escape_literal(code)
    )
}

impl GraphQueryTool {
    pub fn trouble_code_by_code(&self, code: &str) -> QueryResult<Option<EntityId>> {
        self.find_unique(EntityType::TroubleCode, code)
    }

    /// Every known code, sorted.
    pub fn all_codes(&self) -> QueryResult<Vec<String>> {
        self.natural_keys(EntityType::TroubleCode)
    }

    pub fn category_of_code(&self, code: &str) -> QueryResult<Option<EntityKeyRow>> {
        let rows = self.rows(&format!(
            "SELECT DISTINCT ?id ?key WHERE {{\n{}\
             ?dtc obd:hasCategory ?id .\n\
             ?id obd:category_description ?key .\n}}",
            code_anchor(code)
        ))?;
        at_most_one(rows, "FaultCategory", code)
    }

    /// The fault condition a code represents, with its description.
    pub fn condition_of_code(&self, code: &str) -> QueryResult<Option<EntityKeyRow>> {
        let rows = self.rows(&format!(
            "SELECT DISTINCT ?id ?key WHERE {{\n{}\
             ?dtc obd:represents ?id .\n\
             ?id obd:condition_description ?key .\n}}",
            code_anchor(code)
        ))?;
        at_most_one(rows, "FaultCondition", code)
    }

    /// Symptoms manifesting the code's fault condition.
    pub fn symptoms_of_code(&self, code: &str) -> QueryResult<Vec<EntityKeyRow>> {
        let mut rows: Vec<EntityKeyRow> = self.rows(&format!(
            "SELECT DISTINCT ?id ?key WHERE {{\n{}\
             ?dtc obd:represents ?cond .\n\
             ?cond obd:manifestedBy ?id .\n\
             ?id obd:symptom_description ?key .\n}}",
            code_anchor(code)
        ))?;
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    /// Codes this code is recorded as occurring together with.
    pub fn co_occurring_codes(&self, code: &str) -> QueryResult<Vec<String>> {
        let mut codes = self.keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?dtc obd:occurs_with ?other .\n\
             ?other obd:code ?key .\n}}",
            code_anchor(code)
        ))?;
        codes.sort();
        Ok(codes)
    }

    /// Suspect components of a code, sorted by suggestion priority.
    pub fn suspect_components(&self, code: &str) -> QueryResult<Vec<AssociationRow>> {
        self.associations_matching(&code_anchor(code))
    }

    /// Same as [`suspect_components`](Self::suspect_components), by identifier.
    pub fn associations_of(&self, dtc: &EntityId) -> QueryResult<Vec<AssociationRow>> {
        self.associations_matching(&format!("BIND({} AS ?dtc)\n", self.iri(dtc)))
    }

    fn associations_matching(&self, anchor: &str) -> QueryResult<Vec<AssociationRow>> {
        let mut rows: Vec<AssociationRow> = self.rows(&format!(
            "SELECT ?association ?component ?name ?priority WHERE {{\n{anchor}\
             ?dtc obd:hasAssociation ?association .\n\
             ?association obd:pointsTo ?component ;\n\
                          obd:priority_id ?priority .\n\
             ?component obd:component_name ?name .\n}}\n\
             ORDER BY ?priority"
        ))?;
        // Stable sort keeps store order among equal priorities.
        rows.sort_by_key(|r| r.priority);
        Ok(rows)
    }

    /// The association linking this code to this component, if one exists.
    pub fn association_for_pair(
        &self,
        dtc: &EntityId,
        component: &EntityId,
    ) -> QueryResult<Option<EntityId>> {
        let hits = self.ids(&format!(
            "SELECT DISTINCT ?id WHERE {{\n\
             {} obd:hasAssociation ?id .\n\
             ?id obd:pointsTo {} .\n}}",
            self.iri(dtc),
            self.iri(component)
        ))?;
        at_most_one(
            hits,
            "DiagnosticAssociation",
            &format!("{dtc} -> {component}"),
        )
    }

    /// Component sets (subsystems) the code is diagnosed in.
    pub fn subsystems_of_code(&self, code: &str) -> QueryResult<Vec<EntityKeyRow>> {
        let mut rows: Vec<EntityKeyRow> = self.rows(&format!(
            "SELECT DISTINCT ?id ?key WHERE {{\n{}\
             ?dtc obd:affects ?id .\n\
             ?id obd:set_name ?key .\n}}",
            code_anchor(code)
        ))?;
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    /// Trouble codes representing a fault condition.
    pub fn codes_representing(&self, condition: &EntityId) -> QueryResult<Vec<EntityId>> {
        self.relation_sources(pred::REPRESENTS, condition)
    }

    /// Trouble codes with an association pointing at a component.
    pub fn codes_pointing_to(&self, component: &EntityId) -> QueryResult<Vec<EntityId>> {
        self.ids(&format!(
            "SELECT DISTINCT ?id WHERE {{\n\
             ?id obd:hasAssociation ?a .\n\
             ?a obd:pointsTo {} .\n}}",
            self.iri(component)
        ))
    }

    /// Gather a full view of one code, or `None` if it is unknown.
    pub fn trouble_code_summary(&self, code: &str) -> QueryResult<Option<TroubleCodeSummary>> {
        let Some(id) = self.trouble_code_by_code(code)? else {
            return Ok(None);
        };
        let code_type = at_most_one(
            self.property_values(&id, pred::CODE_TYPE)?,
            "code_type",
            code,
        )?;
        Ok(Some(TroubleCodeSummary {
            code: code.to_string(),
            code_type,
            category: self.category_of_code(code)?.map(|r| r.key),
            condition: self.condition_of_code(code)?.map(|r| r.key),
            symptoms: self
                .symptoms_of_code(code)?
                .into_iter()
                .map(|r| r.key)
                .collect(),
            occurs_with: self.co_occurring_codes(code)?,
            suspects: self.associations_of(&id)?,
            subsystems: self
                .subsystems_of_code(code)?
                .into_iter()
                .map(|r| r.key)
                .collect(),
            id,
        }))
    }
}
