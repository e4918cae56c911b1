//! College fixture dataset
//!
//! Three Bangalore colleges with their courses, placements, faculty,
//! infrastructure and events. Some fact nodes are shared between colleges.

use super::relations::*;
use super::{CypherStatement, PropertyMap, COLLEGE_LABEL};
use serde_json::{json, Value};

/// Temporary property used to wire edges while seeding
const SEED_KEY: &str = "seedKey";

#[derive(Debug, Clone)]
pub struct FixtureNode {
    pub key: &'static str,
    pub label: &'static str,
    pub properties: PropertyMap,
}

#[derive(Debug, Clone)]
pub struct FixtureEdge {
    pub from: &'static str,
    pub relation: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureDataset {
    pub nodes: Vec<FixtureNode>,
    pub edges: Vec<FixtureEdge>,
}

fn props(value: Value) -> PropertyMap {
    match value {
        Value::Object(map) => map,
        _ => PropertyMap::new(),
    }
}

impl FixtureDataset {
    fn node(&mut self, key: &'static str, label: &'static str, properties: Value) -> &mut Self {
        self.nodes.push(FixtureNode {
            key,
            label,
            properties: props(properties),
        });
        self
    }

    fn edge(&mut self, from: &'static str, relation: &'static str, to: &'static str) -> &mut Self {
        self.edges.push(FixtureEdge { from, relation, to });
        self
    }

    pub fn find(&self, key: &str) -> Option<&FixtureNode> {
        self.nodes.iter().find(|node| node.key == key)
    }

    /// Statements that replace the store's contents with this dataset
    ///
    /// Meant to run in a single transaction.
    pub fn seed_statements(&self) -> Vec<CypherStatement> {
        let mut statements = vec![CypherStatement::new("MATCH (n) DETACH DELETE n")];

        for node in &self.nodes {
            statements.push(
                CypherStatement::new(format!(
                    "CREATE (n:{}) SET n = $props, n.{} = $key",
                    node.label, SEED_KEY
                ))
                .param("props", Value::Object(node.properties.clone()))
                .param("key", node.key),
            );
        }

        for edge in &self.edges {
            statements.push(
                CypherStatement::new(format!(
                    "MATCH (a {{{key}: $from}}), (b {{{key}: $to}}) CREATE (a)-[:{relation}]->(b)",
                    key = SEED_KEY,
                    relation = edge.relation,
                ))
                .param("from", edge.from)
                .param("to", edge.to),
            );
        }

        statements.push(CypherStatement::new(format!(
            "MATCH (n) WHERE n.{key} IS NOT NULL REMOVE n.{key}",
            key = SEED_KEY
        )));

        statements
    }
}

/// The built-in college dataset
pub fn college_dataset() -> FixtureDataset {
    let mut data = FixtureDataset::default();

    data.node("bms", COLLEGE_LABEL, json!({
            "name": "BMS Institute of Technology", "city": "Bangalore", "established": 2002, "rank": 45
        }))
        .node("rv", COLLEGE_LABEL, json!({
            "name": "RV College of Engineering", "city": "Bangalore", "established": 1963, "rank": 10
        }))
        .node("pes", COLLEGE_LABEL, json!({
            "name": "PES University", "city": "Bangalore", "established": 1972, "rank": 6
        }));

    data.node("course_ece", "Course", json!({
            "name": "Electronics and Communication Engineering", "duration": "4 years"
        }))
        .node("course_cse", "Course", json!({
            "name": "Computer Science Engineering", "duration": "4 years"
        }))
        .node("course_mech", "Course", json!({
            "name": "Mechanical Engineering", "duration": "4 years"
        }));

    data.node("placement_bms", "Placement", json!({"rate": "85%", "avgPackage": "8 LPA"}))
        .node("placement_rv", "Placement", json!({"rate": "90%", "avgPackage": "12 LPA"}))
        .node("placement_pes", "Placement", json!({"rate": "92%", "avgPackage": "15 LPA"}));

    data.node("faculty_ai", "Faculty", json!({"count": 200, "researchFocus": "AI & ML"}))
        .node("faculty_sec", "Faculty", json!({"count": 300, "researchFocus": "Cybersecurity"}));

    data.node("infra_digital", "Infrastructure", json!({
            "hostels": "Yes", "library": "Large digital library"
        }))
        .node("infra_24x7", "Infrastructure", json!({
            "hostels": "Yes", "library": "24x7 Open Library"
        }));

    data.node("fest_utsav", "Event", json!({"name": "Utsav", "type": "Cultural Festival"}))
        .node("fest_tech", "Event", json!({"name": "TechFest", "type": "Technical Festival"}));

    data.edge("bms", OFFERS_COURSE, "course_ece")
        .edge("bms", OFFERS_COURSE, "course_cse")
        .edge("bms", HAS_PLACEMENT, "placement_bms")
        .edge("bms", HAS_FACULTY, "faculty_ai")
        .edge("bms", HAS_INFRASTRUCTURE, "infra_digital")
        .edge("bms", HOSTS_EVENT, "fest_utsav");

    data.edge("rv", OFFERS_COURSE, "course_cse")
        .edge("rv", OFFERS_COURSE, "course_mech")
        .edge("rv", HAS_PLACEMENT, "placement_rv")
        .edge("rv", HAS_FACULTY, "faculty_sec")
        .edge("rv", HAS_INFRASTRUCTURE, "infra_24x7")
        .edge("rv", HOSTS_EVENT, "fest_tech");

    data.edge("pes", OFFERS_COURSE, "course_ece")
        .edge("pes", HAS_PLACEMENT, "placement_pes")
        .edge("pes", HAS_FACULTY, "faculty_ai")
        .edge("pes", HAS_INFRASTRUCTURE, "infra_digital");

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_edge_resolves() {
        let data = college_dataset();
        for edge in &data.edges {
            assert!(data.find(edge.from).is_some(), "missing {}", edge.from);
            assert!(data.find(edge.to).is_some(), "missing {}", edge.to);
        }
    }

    #[test]
    fn test_pes_hosts_no_event() {
        let data = college_dataset();
        assert!(!data
            .edges
            .iter()
            .any(|e| e.from == "pes" && e.relation == HOSTS_EVENT));
    }

    #[test]
    fn test_seed_statements_shape() {
        let data = college_dataset();
        let statements = data.seed_statements();

        assert_eq!(statements.len(), data.nodes.len() + data.edges.len() + 2);
        assert_eq!(statements[0].statement, "MATCH (n) DETACH DELETE n");
        assert!(statements[1].statement.starts_with("CREATE (n:College)"));
        assert_eq!(statements[1].parameters["key"], "bms");
        assert!(statements.last().unwrap().statement.contains("REMOVE n.seedKey"));
    }
}
