//! Ambiguity fallback - asks the language model to disambiguate a turn
//!
//! Provides:
//! - Trigger detection (no intent, `compare`, several intents)
//! - Context-aware parsing prompt
//! - Strict line-directive parser that fails closed
//! - Lenient pattern extraction for weaker models

use super::lexicon::{Intent, Lexicon};
use super::resolved::ResolvedQuery;
use crate::config::FallbackConfig;
use crate::errors::{AppError, Result};
use crate::llm::{GenerationPurpose, GenerationRequest, TextGenerator};
use crate::metrics;
use crate::session::SessionContext;
use regex_lite::Regex;
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument};

/// Why the rule-based result was considered insufficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTrigger {
    NoIntent,
    Compare,
    MultipleIntents,
}

impl FallbackTrigger {
    /// Check a merged turn for ambiguity
    pub fn detect(resolved: &ResolvedQuery) -> Option<Self> {
        if resolved.intents.is_empty() {
            Some(FallbackTrigger::NoIntent)
        } else if resolved.has_compare() {
            Some(FallbackTrigger::Compare)
        } else if resolved.intents.len() > 1 {
            Some(FallbackTrigger::MultipleIntents)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackTrigger::NoIntent => "no_intent",
            FallbackTrigger::Compare => "compare",
            FallbackTrigger::MultipleIntents => "multiple_intents",
        }
    }
}

/// Entities and intents proposed by the model, before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackCandidates {
    pub entities: Vec<String>,
    pub intents: Vec<Intent>,
}

fn join_or_none<T: AsRef<str>>(items: impl Iterator<Item = T>) -> String {
    let joined = items
        .map(|item| item.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined
    }
}

/// Build the disambiguation prompt
pub fn build_prompt(query: &str, previous: &SessionContext) -> String {
    let intents = Intent::ALL
        .iter()
        .map(Intent::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You extract search parameters from a question about colleges.\n\
         Question: {query}\n\
         Colleges from the previous turn: {entities}\n\
         Topics from the previous turn: {previous_intents}\n\
         \n\
         Reply with one directive per line and nothing else:\n\
         intent: <one of {intents}>\n\
         college: <full college name>\n\
         Repeat a directive for each intent or college you find. \
         If the question names no college or topic, reply with the single word none.",
        query = query.trim(),
        entities = join_or_none(previous.previous_entities.iter()),
        previous_intents = join_or_none(previous.previous_intents.iter().map(Intent::as_str)),
    )
}

fn malformed(line: &str) -> AppError {
    AppError::MalformedModelOutput {
        message: format!("unexpected line in parsing reply: {:?}", line),
    }
}

/// Whether a line is `none` or starts with a directive key
fn is_directive(line: &str) -> bool {
    line.eq_ignore_ascii_case("none")
        || line.split_once(':').is_some_and(|(key, _)| {
            matches!(key.trim().to_lowercase().as_str(), "intent" | "college")
        })
}

/// Parse a reply made only of `intent:`/`college:` lines or `none`
///
/// Blank lines and code fences are skipped, as is one lead-in line when
/// directives follow it. Anything else fails the turn.
pub fn parse_strict(reply: &str) -> Result<FallbackCandidates> {
    let content: Vec<&str> = reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .collect();

    let body = match content.split_first() {
        Some((first, rest)) if !rest.is_empty() && !is_directive(first) => rest,
        _ => &content[..],
    };

    let mut candidates = FallbackCandidates::default();
    for &line in body {
        if line.eq_ignore_ascii_case("none") {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or_else(|| malformed(line))?;
        let value = value.trim();

        match key.trim().to_lowercase().as_str() {
            "intent" => {
                let intent = Intent::from_str(value).map_err(|_| malformed(line))?;
                candidates.intents.push(intent);
            }
            "college" if !value.is_empty() => candidates.entities.push(value.to_string()),
            _ => return Err(malformed(line)),
        }
    }

    Ok(candidates)
}

const INTENT_PATTERN: &str = r"(?i)intent:\s*([A-Za-z]+)";
const COLLEGE_PATTERN: &str = r"(?i)college:\s*([A-Za-z0-9.&' ]+)";

struct LenientPatterns {
    intent: Regex,
    college: Regex,
}

static LENIENT_PATTERNS: OnceLock<std::result::Result<LenientPatterns, String>> = OnceLock::new();

fn lenient_patterns() -> Result<&'static LenientPatterns> {
    LENIENT_PATTERNS
        .get_or_init(|| {
            Ok(LenientPatterns {
                intent: Regex::new(INTENT_PATTERN).map_err(|e| e.to_string())?,
                college: Regex::new(COLLEGE_PATTERN).map_err(|e| e.to_string())?,
            })
        })
        .as_ref()
        .map_err(|e| AppError::Internal {
            message: format!("Invalid fallback pattern: {}", e),
        })
}

/// Best-effort extraction of `intent: <word>` and `college: <words>` anywhere
///
/// Unknown intent words are dropped.
pub fn parse_lenient(reply: &str) -> Result<FallbackCandidates> {
    let patterns = lenient_patterns()?;

    let intents = patterns
        .intent
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| Intent::from_str(m.as_str()).ok())
        .collect();

    let entities = patterns
        .college
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    Ok(FallbackCandidates { entities, intents })
}

/// Language-model backed resolver for ambiguous turns
pub struct FallbackParser {
    generator: Arc<dyn TextGenerator>,
    lexicon: Arc<Lexicon>,
    enabled: bool,
    strict: bool,
}

impl FallbackParser {
    pub fn new(generator: Arc<dyn TextGenerator>, lexicon: Arc<Lexicon>, config: &FallbackConfig) -> Self {
        Self {
            generator,
            lexicon,
            enabled: config.enabled,
            strict: config.strict,
        }
    }

    /// Run the fallback if the turn is ambiguous, unioning candidates into `resolved`
    ///
    /// Returns the trigger when the model was consulted.
    #[instrument(skip(self, previous, resolved), fields(model = self.generator.model_name()))]
    pub async fn resolve(
        &self,
        query: &str,
        previous: &SessionContext,
        resolved: &mut ResolvedQuery,
    ) -> Result<Option<FallbackTrigger>> {
        let Some(trigger) = FallbackTrigger::detect(resolved) else {
            return Ok(None);
        };
        if !self.enabled {
            debug!(trigger = trigger.as_str(), "Fallback disabled, keeping rule-based result");
            return Ok(None);
        }

        metrics::record_fallback(trigger.as_str());

        let request = GenerationRequest::new(GenerationPurpose::QueryParsing, build_prompt(query, previous));
        let reply = self.generator.generate(&request).await?;

        let candidates = if self.strict {
            parse_strict(&reply)?
        } else {
            parse_lenient(&reply)?
        };

        for entity in &candidates.entities {
            resolved.entities.insert(self.lexicon.normalize_entity(entity));
        }
        resolved.intents.extend(candidates.intents.iter().copied());

        debug!(
            trigger = trigger.as_str(),
            entities = ?resolved.entities,
            intents = ?resolved.intents,
            "Fallback merged"
        );
        Ok(Some(trigger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::resolved::OrderedSet;
    use crate::llm::MockGenerator;

    fn resolved(entities: &[&str], intents: &[Intent]) -> ResolvedQuery {
        ResolvedQuery {
            entities: entities.iter().map(|e| e.to_string()).collect(),
            intents: intents.iter().copied().collect::<OrderedSet<_>>(),
        }
    }

    fn parser(mock: Arc<MockGenerator>, strict: bool) -> FallbackParser {
        FallbackParser::new(
            mock,
            Arc::new(Lexicon::new()),
            &FallbackConfig {
                enabled: true,
                strict,
            },
        )
    }

    #[test]
    fn test_trigger_detection() {
        assert_eq!(FallbackTrigger::detect(&resolved(&[], &[])), Some(FallbackTrigger::NoIntent));
        assert_eq!(
            FallbackTrigger::detect(&resolved(&["PES University"], &[Intent::Compare])),
            Some(FallbackTrigger::Compare)
        );
        assert_eq!(
            FallbackTrigger::detect(&resolved(&["PES University"], &[Intent::Course, Intent::Event])),
            Some(FallbackTrigger::MultipleIntents)
        );
        assert_eq!(
            FallbackTrigger::detect(&resolved(&["PES University"], &[Intent::Course])),
            None
        );
    }

    #[test]
    fn test_prompt_carries_previous_turn() {
        let previous = SessionContext {
            previous_entities: vec!["PES University".to_string()],
            previous_intents: vec![Intent::Faculty],
        };
        let prompt = build_prompt("and the events?", &previous);

        assert!(prompt.contains("Question: and the events?"));
        assert!(prompt.contains("previous turn: PES University"));
        assert!(prompt.contains("previous turn: faculty"));

        let prompt = build_prompt("hello", &SessionContext::default());
        assert!(prompt.contains("Colleges from the previous turn: none"));
    }

    #[test]
    fn test_strict_parsing() {
        let reply = "```\nintent: placement\ncollege: RVCE\n\nCollege: PES University\n```";
        let candidates = parse_strict(reply).unwrap();

        assert_eq!(candidates.intents, vec![Intent::Placement]);
        assert_eq!(candidates.entities, vec!["RVCE", "PES University"]);
    }

    #[test]
    fn test_strict_none_is_empty() {
        assert_eq!(parse_strict("none").unwrap(), FallbackCandidates::default());
        assert_eq!(parse_strict("  None \n").unwrap(), FallbackCandidates::default());
    }

    #[test]
    fn test_strict_fails_closed() {
        for reply in [
            "Sure! The college is RVCE.",
            "intent: salary",
            "college:",
            "topic: placement",
        ] {
            assert!(
                matches!(parse_strict(reply), Err(AppError::MalformedModelOutput { .. })),
                "accepted {reply:?}"
            );
        }
    }

    #[test]
    fn test_strict_skips_one_lead_in_line() {
        let reply = "Sure! Here they are:\nintent: compare\ncollege: RV College of Engineering\ncollege: PES University";
        let candidates = parse_strict(reply).unwrap();

        assert_eq!(candidates.intents, vec![Intent::Compare]);
        assert_eq!(
            candidates.entities,
            vec!["RV College of Engineering", "PES University"]
        );

        // Only the first line gets that latitude
        let reply = "Sure!\nHere they are:\nintent: compare";
        assert!(matches!(parse_strict(reply), Err(AppError::MalformedModelOutput { .. })));
    }

    #[test]
    fn test_lenient_extraction() {
        let reply = "I think intent: course and intent: salary apply. college: rvce, college: PES University";
        let candidates = parse_lenient(reply).unwrap();

        assert_eq!(candidates.intents, vec![Intent::Course]);
        assert_eq!(candidates.entities, vec!["rvce", "PES University"]);
    }

    #[tokio::test]
    async fn test_compare_turn_consults_model() {
        let mock = Arc::new(
            MockGenerator::new().with_parse_reply("college: rvce\ncollege: PES University\nintent: compare"),
        );
        let fallback = parser(mock.clone(), true);
        let mut turn = resolved(&["RV College of Engineering", "PES University"], &[Intent::Compare]);

        let trigger = fallback
            .resolve("compare rv and pes", &SessionContext::default(), &mut turn)
            .await
            .unwrap();

        assert_eq!(trigger, Some(FallbackTrigger::Compare));
        assert_eq!(
            turn.entities.as_slice(),
            &["RV College of Engineering".to_string(), "PES University".to_string()]
        );
        assert_eq!(turn.intents.as_slice(), &[Intent::Compare]);
        assert_eq!(mock.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_candidates_append_without_removal() {
        let mock = Arc::new(MockGenerator::new().with_parse_reply("intent: event\ncollege: Some Other College"));
        let fallback = parser(mock, true);
        let mut turn = resolved(&["PES University"], &[Intent::Course, Intent::Faculty]);

        fallback
            .resolve("courses and faculty at pes", &SessionContext::default(), &mut turn)
            .await
            .unwrap();

        assert_eq!(
            turn.entities.as_slice(),
            &["PES University".to_string(), "Some Other College".to_string()]
        );
        assert_eq!(
            turn.intents.as_slice(),
            &[Intent::Course, Intent::Faculty, Intent::Event]
        );
    }

    #[tokio::test]
    async fn test_unambiguous_turn_skips_model() {
        let mock = Arc::new(MockGenerator::new());
        let fallback = parser(mock.clone(), true);
        let mut turn = resolved(&["PES University"], &[Intent::Course]);

        let trigger = fallback
            .resolve("courses at pes", &SessionContext::default(), &mut turn)
            .await
            .unwrap();

        assert_eq!(trigger, None);
        assert!(mock.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_turn() {
        let mock = Arc::new(MockGenerator::new().with_parse_reply("I am not sure what you mean."));
        let fallback = parser(mock, true);
        let mut turn = resolved(&[], &[]);

        let result = fallback
            .resolve("hmm", &SessionContext::default(), &mut turn)
            .await;
        assert!(matches!(result, Err(AppError::MalformedModelOutput { .. })));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let mock = Arc::new(MockGenerator::new().failing_on(GenerationPurpose::QueryParsing));
        let fallback = parser(mock, true);
        let mut turn = resolved(&[], &[]);

        let result = fallback
            .resolve("hmm", &SessionContext::default(), &mut turn)
            .await;
        assert!(matches!(result, Err(AppError::LanguageModel { .. })));
    }

    #[tokio::test]
    async fn test_disabled_fallback() {
        let mock = Arc::new(MockGenerator::new());
        let fallback = FallbackParser::new(
            mock.clone(),
            Arc::new(Lexicon::new()),
            &FallbackConfig {
                enabled: false,
                strict: true,
            },
        );
        let mut turn = resolved(&[], &[]);

        let trigger = fallback
            .resolve("hmm", &SessionContext::default(), &mut turn)
            .await
            .unwrap();
        assert_eq!(trigger, None);
        assert!(mock.requests().await.is_empty());
    }
}
