//! Suspect components, sub-components, and component sets (subsystems).

use serde::{Deserialize, Serialize};

use crate::error::QueryResult;
use crate::ident::EntityId;
use crate::vocab::{pred, EntityType};

use super::rows::{CountRow, FromBinding};
use super::{at_most_one, escape_literal, GraphQueryTool};

/// Everything the graph knows about one suspect component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub id: EntityId,
    pub name: String,
    pub use_oscilloscope: Option<bool>,
    pub affected_by: Vec<String>,
    pub subcomponents: Vec<String>,
    pub sets_including: Vec<String>,
    pub sets_containing: Vec<String>,
}

fn component_anchor(name: &str) -> String {
    format!(
        "?c rdf:type obd:SuspectComponent ; obd:component_name ?cname .\n\
         FILTER(STR(?cname) = \"{}\")\n",
        escape_literal(name)
    )
}

fn set_anchor(name: &str) -> String {
    format!(
        "?set rdf:type obd:ComponentSet ; obd:set_name ?sname .\n\
         FILTER(STR(?sname) = \"{}\")\n",
        escape_literal(name)
    )
}

impl GraphQueryTool {
    /// Sorted, de-duplicated `?key` column of a query.
    fn sorted_keys(&self, body: &str) -> QueryResult<Vec<String>> {
        let mut keys = self.keys(body)?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    pub fn component_by_name(&self, name: &str) -> QueryResult<Option<EntityId>> {
        self.find_unique(EntityType::SuspectComponent, name)
    }

    pub fn all_component_names(&self) -> QueryResult<Vec<String>> {
        self.natural_keys(EntityType::SuspectComponent)
    }

    /// Names of the components this component is affected by.
    pub fn affected_by(&self, name: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?c obd:affected_by ?other .\n\
             ?other obd:component_name ?key .\n}}",
            component_anchor(name)
        ))
    }

    /// Names of the components that list this one in their `affected_by`.
    pub fn components_affected_by(&self, name: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?other obd:affected_by ?c ;\n\
                    obd:component_name ?key .\n}}",
            component_anchor(name)
        ))
    }

    /// `None` if the component is unknown or the flag was never set.
    pub fn uses_oscilloscope(&self, name: &str) -> QueryResult<Option<bool>> {
        let Some(id) = self.component_by_name(name)? else {
            return Ok(None);
        };
        let values = self.property_values(&id, pred::USE_OSCILLOSCOPE)?;
        Ok(at_most_one(values, pred::USE_OSCILLOSCOPE, name)?
            .map(|v| v == "true" || v == "1"))
    }

    pub fn subcomponents_of(&self, name: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?sub rdf:type obd:SubComponent ;\n\
                  obd:partOf ?c ;\n\
                  obd:component_name ?key .\n}}",
            component_anchor(name)
        ))
    }

    /// Sets that explicitly include the component.
    pub fn sets_including(&self, name: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?set obd:includes ?c ;\n\
                  obd:set_name ?key .\n}}",
            component_anchor(name)
        ))
    }

    /// Sets whose diagnostic paths reach the component.
    pub fn sets_containing(&self, name: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?set obd:contains ?c ;\n\
                  obd:set_name ?key .\n}}",
            component_anchor(name)
        ))
    }

    pub fn set_by_name(&self, name: &str) -> QueryResult<Option<EntityId>> {
        self.find_unique(EntityType::ComponentSet, name)
    }

    pub fn set_includes(&self, set_name: &str) -> QueryResult<Vec<String>> {
        self.set_members(set_name, pred::INCLUDES)
    }

    pub fn set_contains(&self, set_name: &str) -> QueryResult<Vec<String>> {
        self.set_members(set_name, pred::CONTAINS)
    }

    fn set_members(&self, set_name: &str, predicate: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?set obd:{predicate} ?c .\n\
             ?c obd:component_name ?key .\n}}",
            set_anchor(set_name)
        ))
    }

    /// Components that verify the set.
    pub fn set_verifiers(&self, set_name: &str) -> QueryResult<Vec<String>> {
        self.sorted_keys(&format!(
            "SELECT DISTINCT ?key WHERE {{\n{}\
             ?c obd:verifies ?set ;\n\
                obd:component_name ?key .\n}}",
            set_anchor(set_name)
        ))
    }

    /// How many trouble codes other than `excluding` still justify the edge
    /// `set contains component`: codes that affect the set and have an
    /// association pointing at the component.
    pub fn contains_justifications(
        &self,
        set: &EntityId,
        component: &EntityId,
        excluding: &EntityId,
    ) -> QueryResult<u64> {
        let rows = self.select(&format!(
            "SELECT (COUNT(DISTINCT ?dtc) AS ?count) WHERE {{\n\
             ?dtc obd:affects {set} ;\n\
                  obd:hasAssociation ?a .\n\
             ?a obd:pointsTo {component} .\n\
             FILTER(?dtc != {excluding})\n}}",
            set = self.iri(set),
            component = self.iri(component),
            excluding = self.iri(excluding),
        ))?;
        match rows.first() {
            Some(row) => Ok(CountRow::from_binding(row, self.namespace())?.count),
            None => Ok(0),
        }
    }

    pub fn component_summary(&self, name: &str) -> QueryResult<Option<ComponentSummary>> {
        let Some(id) = self.component_by_name(name)? else {
            return Ok(None);
        };
        Ok(Some(ComponentSummary {
            name: name.to_string(),
            use_oscilloscope: self.uses_oscilloscope(name)?,
            affected_by: self.affected_by(name)?,
            subcomponents: self.subcomponents_of(name)?,
            sets_including: self.sets_including(name)?,
            sets_containing: self.sets_containing(name)?,
            id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact::Fact;
    use crate::graph::GraphConnection;
    use crate::vocab::Namespace;
    use std::sync::Arc;

    fn component(id: &str, name: &str) -> Vec<Fact> {
        vec![
            Fact::typed(&EntityId::new(id), EntityType::SuspectComponent),
            Fact::property(id, pred::COMPONENT_NAME, name),
        ]
    }

    fn seeded() -> GraphQueryTool {
        let conn = GraphConnection::in_memory(Namespace::default()).unwrap();
        let tool = GraphQueryTool::new(Arc::new(conn));
        let mut facts = Vec::new();
        facts.extend(component("comp_1", "Sensor1"));
        facts.extend(component("comp_2", "Sensor2"));
        facts.push(Fact::relation("comp_2", pred::AFFECTED_BY, "comp_1"));
        facts.push(Fact::property("comp_2", pred::USE_OSCILLOSCOPE, "true"));
        facts.push(Fact::typed(&EntityId::new("comp_set_1"), EntityType::ComponentSet));
        facts.push(Fact::property("comp_set_1", pred::SET_NAME, "Cooling"));
        facts.push(Fact::relation("comp_set_1", pred::INCLUDES, "comp_1"));
        facts.push(Fact::relation("comp_2", pred::VERIFIES, "comp_set_1"));
        tool.connection().insert(&facts).unwrap();
        tool
    }

    #[test]
    fn affected_by_both_directions() {
        let tool = seeded();
        assert_eq!(tool.affected_by("Sensor2").unwrap(), vec!["Sensor1"]);
        assert_eq!(tool.components_affected_by("Sensor1").unwrap(), vec!["Sensor2"]);
        assert!(tool.affected_by("Sensor1").unwrap().is_empty());
    }

    #[test]
    fn oscilloscope_flag_reads_boolean() {
        let tool = seeded();
        assert_eq!(tool.uses_oscilloscope("Sensor2").unwrap(), Some(true));
        assert_eq!(tool.uses_oscilloscope("Sensor1").unwrap(), None);
        assert_eq!(tool.uses_oscilloscope("Nope").unwrap(), None);
    }

    #[test]
    fn set_membership() {
        let tool = seeded();
        assert_eq!(tool.set_includes("Cooling").unwrap(), vec!["Sensor1"]);
        assert_eq!(tool.set_verifiers("Cooling").unwrap(), vec!["Sensor2"]);
        assert_eq!(tool.sets_including("Sensor1").unwrap(), vec!["Cooling"]);
        assert!(tool.set_contains("Cooling").unwrap().is_empty());
    }

    #[test]
    fn justification_count_excludes_given_code() {
        let tool = seeded();
        let mut facts = Vec::new();
        for dtc in ["dtc_1", "dtc_2"] {
            let assoc = format!("diag_association_{dtc}");
            facts.push(Fact::relation(dtc, pred::AFFECTS, "comp_set_1"));
            facts.push(Fact::relation(dtc, pred::HAS_ASSOCIATION, assoc.as_str()));
            facts.push(Fact::relation(assoc.as_str(), pred::POINTS_TO, "comp_1"));
        }
        tool.connection().insert(&facts).unwrap();

        let set = EntityId::new("comp_set_1");
        let comp = EntityId::new("comp_1");
        assert_eq!(
            tool.contains_justifications(&set, &comp, &EntityId::new("dtc_1")).unwrap(),
            1
        );
        assert_eq!(
            tool.contains_justifications(&set, &comp, &EntityId::new("dtc_3")).unwrap(),
            2
        );
    }
}
