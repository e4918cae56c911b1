//! Query-understanding pipeline
//!
//! The intelligence layer of CampusCandid:
//! - Lexical resolution of colleges and intents
//! - Context carry-over between turns
//! - Language-model fallback for ambiguous turns
//! - Graph retrieval and evidence formatting
//! - Answer synthesis

mod context_merger;
mod fallback;
mod formatter;
mod lexicon;
mod pipeline;
mod query_parser;
mod resolved;
mod retrieval;
mod synthesizer;

pub use context_merger::{apply_default_intent, ensure_retrievable_intent, merge, DEFAULT_INTENT};
pub use fallback::{build_prompt as build_parsing_prompt, parse_lenient, parse_strict, FallbackCandidates, FallbackParser, FallbackTrigger};
pub use formatter::{humanize_key, ResponseFormatter};
pub use lexicon::{tokenize, Intent, Lexicon, ALIASES, GENERIC_TOKENS};
pub use pipeline::{QueryPipeline, TurnOutcome};
pub use query_parser::{LexicalMatch, QueryParser};
pub use resolved::{OrderedSet, ResolvedQuery};
pub use retrieval::{traverse_all, Evidence, EvidenceItem, GraphQueryEngine};
pub use synthesizer::{build_prompt as build_answer_prompt, Synthesizer};
