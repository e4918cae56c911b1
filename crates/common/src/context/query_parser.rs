//! Query Parser - rule-based entity and intent resolution
//!
//! Provides:
//! - Word-boundary tokenization
//! - Alias-table lookup to canonical college names
//! - Keyword-table lookup to intents

use super::lexicon::{tokenize, Intent, Lexicon};
use super::resolved::OrderedSet;
use serde::Serialize;
use std::sync::Arc;

/// Result of the rule-based pass over one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LexicalMatch {
    /// Canonical names in order of first matching token
    pub entities: OrderedSet<String>,

    /// Intents in order of first matching token
    pub intents: OrderedSet<Intent>,
}

/// Query parser for resolving colleges and intents from free text
#[derive(Debug, Clone)]
pub struct QueryParser {
    lexicon: Arc<Lexicon>,
}

impl QueryParser {
    /// Create a new query parser over a lexicon
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }

    /// Resolve entities and intents from a query
    ///
    /// Never fails; a query with no recognized tokens yields empty sets.
    pub fn parse(&self, query: &str) -> LexicalMatch {
        let mut result = LexicalMatch::default();

        for token in tokenize(&query.to_lowercase()) {
            for entity in self.lexicon.entities_for_token(&token) {
                result.entities.insert(entity.clone());
            }

            if let Some(intent) = self.lexicon.intent_for_token(&token) {
                result.intents.insert(intent);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser {
        QueryParser::new(Arc::new(Lexicon::new()))
    }

    #[test]
    fn test_placement_query() {
        let result = parser().parse("placement stats for bmsit");

        assert_eq!(result.entities.as_slice(), ["BMS Institute of Technology"]);
        assert_eq!(result.intents.as_slice(), [Intent::Placement]);
    }

    #[test]
    fn test_compare_query() {
        let result = parser().parse("compare rv and pes");

        assert_eq!(
            result.entities.as_slice(),
            ["RV College of Engineering", "PES University"]
        );
        assert_eq!(result.intents.as_slice(), [Intent::Compare]);
    }

    #[test]
    fn test_alias_variants_collapse_to_one_entity() {
        let result = parser().parse("Is RVCE the same as RV? rv college placements");

        assert_eq!(result.entities.as_slice(), ["RV College of Engineering"]);
        assert_eq!(result.intents.as_slice(), [Intent::Placement]);
    }

    #[test]
    fn test_intents_in_first_seen_order() {
        let result = parser().parse("hostels, courses and placements at pesu");

        assert_eq!(
            result.intents.as_slice(),
            [Intent::Infrastructure, Intent::Course, Intent::Placement]
        );
    }

    #[test]
    fn test_case_insensitive() {
        let result = parser().parse("FACULTY at PES");

        assert_eq!(result.entities.as_slice(), ["PES University"]);
        assert_eq!(result.intents.as_slice(), [Intent::Faculty]);
    }

    #[test]
    fn test_no_matches() {
        let result = parser().parse("what about the weather?");

        assert!(result.entities.is_empty());
        assert!(result.intents.is_empty());
    }

    #[test]
    fn test_single_constituent_resolves_college() {
        let cases = [
            ("placements at the university", "PES University"),
            ("engineering placements", "RV College of Engineering"),
            ("institute placements", "BMS Institute of Technology"),
            ("technology placements", "BMS Institute of Technology"),
        ];

        for (query, expected) in cases {
            let result = parser().parse(query);
            assert_eq!(result.entities.as_slice(), [expected], "query {query:?}");
            assert_eq!(result.intents.as_slice(), [Intent::Placement]);
        }
    }

    #[test]
    fn test_generic_word_alone_matches_nothing() {
        let result = parser().parse("which college is best");

        assert!(result.entities.is_empty());
        assert!(result.intents.is_empty());
    }
}
