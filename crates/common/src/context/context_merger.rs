//! Context Merger - fills gaps in a turn from the previous turn
//!
//! Policy, in order:
//! 1. no entities found → previous entities
//! 2. no intents found → previous intents
//! 3. still no intents but entities present → {placement}

use super::lexicon::Intent;
use super::query_parser::LexicalMatch;
use super::resolved::ResolvedQuery;
use crate::session::SessionContext;

/// Intent assumed when a turn names a college but nothing to ask about it
pub const DEFAULT_INTENT: Intent = Intent::Placement;

/// Merge the rule-based match with the previous turn's context
pub fn merge(found: LexicalMatch, previous: &SessionContext) -> ResolvedQuery {
    let mut resolved = ResolvedQuery {
        entities: found.entities,
        intents: found.intents,
    };

    if resolved.entities.is_empty() && !previous.previous_entities.is_empty() {
        resolved
            .entities
            .extend(previous.previous_entities.iter().cloned());
    }

    if resolved.intents.is_empty() && !previous.previous_intents.is_empty() {
        resolved
            .intents
            .extend(previous.previous_intents.iter().copied());
    }

    apply_default_intent(&mut resolved);
    resolved
}

/// Add the default intent when entities are known but intents are not
pub fn apply_default_intent(resolved: &mut ResolvedQuery) {
    if resolved.intents.is_empty() && !resolved.entities.is_empty() {
        resolved.intents.insert(DEFAULT_INTENT);
    }
}

/// Add the default intent when nothing retrievable is left (e.g. only `compare`)
pub fn ensure_retrievable_intent(resolved: &mut ResolvedQuery) {
    if !resolved.entities.is_empty() && resolved.retrievable_intents().next().is_none() {
        resolved.intents.insert(DEFAULT_INTENT);
    }
}
