//! CampusCandid Common Library
//!
//! Shared code for the CampusCandid services including:
//! - Query-understanding pipeline
//! - Graph store abstraction and fixture dataset
//! - Language-model client abstraction
//! - Session context store
//! - Error types and handling
//! - Configuration management
//! - Metrics and retry policy

pub mod config;
pub mod context;
pub mod errors;
pub mod graph;
pub mod llm;
pub mod metrics;
pub mod retry;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::{QueryPipeline, TurnOutcome};
pub use errors::{AppError, Result};
pub use graph::GraphStore;
pub use llm::TextGenerator;
pub use session::SessionStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
