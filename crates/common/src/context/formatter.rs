//! Response Formatter - renders evidence into a text block for the model
//!
//! Standard mode: one block per entity, placement phrased explicitly,
//! empty pairs rendered as "<intent>: No data found".
//! Compare mode: one block per entity, each intent as "<Intent>: Key: Value, ...".

use super::lexicon::Intent;
use super::resolved::ResolvedQuery;
use super::retrieval::EvidenceItem;
use crate::config::RenderConfig;
use crate::graph::{PropertyMap, RelationRecord};
use serde_json::Value;

const PROFILE_KEYS: [(&str, &str); 3] = [("city", "City"), ("established", "Established"), ("rank", "Rank")];

/// Render a property value without JSON quoting
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "N/A".to_string(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// `avgPackage` → `Avg Package`, `research_focus` → `Research Focus`
pub fn humanize_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if c == '_' || c == '-' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `Key: Value` pairs in sorted key order
fn render_properties(properties: &PropertyMap) -> String {
    let mut keys: Vec<&String> = properties.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|key| format!("{}: {}", humanize_key(key), render_value(&properties[key.as_str()])))
        .collect::<Vec<_>>()
        .join(", ")
}

fn property(properties: &PropertyMap, key: &str) -> String {
    properties
        .get(key)
        .map(render_value)
        .unwrap_or_else(|| "N/A".to_string())
}

/// `<name> (City: …, Established: …, Rank: …)` from a college node
fn profile_line(entity: &str, subject: &PropertyMap) -> String {
    let name = subject
        .get("name")
        .map(render_value)
        .unwrap_or_else(|| entity.to_string());
    let details: Vec<String> = PROFILE_KEYS
        .iter()
        .filter_map(|(key, label)| subject.get(*key).map(|v| format!("{}: {}", label, render_value(v))))
        .collect();

    if details.is_empty() {
        name
    } else {
        format!("{} ({})", name, details.join(", "))
    }
}

/// Renders evidence blocks
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    records_per_pair: usize,
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self { records_per_pair: 1 }
    }
}

impl ResponseFormatter {
    pub fn new(records_per_pair: usize) -> Self {
        Self {
            records_per_pair: records_per_pair.max(1),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.records_per_pair)
    }

    /// Render the evidence for a turn
    pub fn format(&self, resolved: &ResolvedQuery, evidence: &[EvidenceItem]) -> String {
        let compare = resolved.is_compare_mode();

        resolved
            .entities
            .iter()
            .map(|entity| {
                let items: Vec<&EvidenceItem> = evidence.iter().filter(|item| &item.entity == entity).collect();
                self.entity_block(entity, &items, compare)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn entity_block(&self, entity: &str, items: &[&EvidenceItem], compare: bool) -> String {
        let header = items
            .iter()
            .find_map(|item| item.records.first())
            .map(|record| profile_line(entity, &record.subject))
            .unwrap_or_else(|| entity.to_string());

        let mut lines = vec![header];
        for item in items {
            if compare {
                lines.extend(self.compare_lines(item));
            } else {
                lines.extend(self.standard_lines(entity, item));
            }
        }
        lines.join("\n")
    }

    fn shown<'a>(&self, item: &'a EvidenceItem) -> impl Iterator<Item = &'a RelationRecord> {
        item.records.iter().take(self.records_per_pair)
    }

    fn standard_lines(&self, entity: &str, item: &EvidenceItem) -> Vec<String> {
        if item.records.is_empty() {
            return vec![format!("{}: No data found", item.intent.as_str())];
        }

        self.shown(item)
            .map(|record| match item.intent {
                Intent::Placement => format!(
                    "Placement stats for {}: Rate: {}, Average Package: {}",
                    entity,
                    property(&record.object, "rate"),
                    property(&record.object, "avgPackage"),
                ),
                intent => format!(
                    "{} details for {}: {}",
                    intent.label(),
                    entity,
                    render_properties(&record.object)
                ),
            })
            .collect()
    }

    fn compare_lines(&self, item: &EvidenceItem) -> Vec<String> {
        if item.records.is_empty() {
            return vec![format!("{}: No data found", item.intent.label())];
        }

        self.shown(item)
            .map(|record| format!("{}: {}", item.intent.label(), render_properties(&record.object)))
            .collect()
    }
}
