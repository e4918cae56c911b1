//! Answer Synthesizer - turns formatted evidence into a natural-language answer

use crate::errors::Result;
use crate::llm::{GenerationPurpose, GenerationRequest, TextGenerator};
use std::sync::Arc;
use tracing::instrument;

/// Build the answer prompt from evidence and the user's question
pub fn build_prompt(evidence: &str, query: &str) -> String {
    format!(
        "Based on this structured knowledge about colleges: \n\n{}\n\nAnswer: {}",
        evidence,
        query.trim()
    )
}

/// Synthesizer for generating answers
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Generate the final answer; the model's text is returned verbatim
    #[instrument(skip(self, evidence), fields(model = self.generator.model_name()))]
    pub async fn synthesize(&self, query: &str, evidence: &str) -> Result<String> {
        let request = GenerationRequest::new(GenerationPurpose::Answer, build_prompt(evidence, query));
        self.generator.generate(&request).await
    }
}
