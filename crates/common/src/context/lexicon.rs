//! Closed vocabularies for query understanding
//!
//! - Intent enum and the intent → relation table
//! - Alias table (surface form → canonical college name)
//! - Intent keyword table

use crate::graph::relations;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Category of fact requested about a college
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Placement,
    Course,
    Faculty,
    Infrastructure,
    Event,
    /// Modifier selecting the side-by-side layout; has no relation
    Compare,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Placement,
        Intent::Course,
        Intent::Faculty,
        Intent::Infrastructure,
        Intent::Event,
        Intent::Compare,
    ];

    /// Lower-case tag, as used in prompts and "No data found" lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Placement => "placement",
            Intent::Course => "course",
            Intent::Faculty => "faculty",
            Intent::Infrastructure => "infrastructure",
            Intent::Event => "event",
            Intent::Compare => "compare",
        }
    }

    /// Title-cased label for compare blocks
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Placement => "Placement",
            Intent::Course => "Course",
            Intent::Faculty => "Faculty",
            Intent::Infrastructure => "Infrastructure",
            Intent::Event => "Event",
            Intent::Compare => "Compare",
        }
    }

    /// Graph relationship type traversed for this intent
    pub fn relation(&self) -> Option<&'static str> {
        match self {
            Intent::Placement => Some(relations::HAS_PLACEMENT),
            Intent::Course => Some(relations::OFFERS_COURSE),
            Intent::Faculty => Some(relations::HAS_FACULTY),
            Intent::Infrastructure => Some(relations::HAS_INFRASTRUCTURE),
            Intent::Event => Some(relations::HOSTS_EVENT),
            Intent::Compare => None,
        }
    }

    /// Whether a relation can be retrieved for this intent
    pub fn is_retrievable(&self) -> bool {
        self.relation().is_some()
    }

    /// Keyword forms that select this intent (exact token match)
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Intent::Placement => &[
                "placement", "placements", "placed", "package", "packages",
                "salary", "salaries", "recruitment", "recruiters", "ctc",
            ],
            Intent::Course => &[
                "course", "courses", "program", "programs", "programme",
                "branch", "branches", "degree", "degrees",
            ],
            Intent::Faculty => &[
                "faculty", "faculties", "professor", "professors", "teachers",
                "teaching", "research",
            ],
            Intent::Infrastructure => &[
                "infrastructure", "infra", "hostel", "hostels", "library",
                "libraries", "facilities", "campus",
            ],
            Intent::Event => &[
                "event", "events", "fest", "fests", "festival", "festivals",
                "cultural", "techfest",
            ],
            Intent::Compare => &[
                "compare", "comparison", "comparing", "versus", "vs", "better",
            ],
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    /// Parse a tag case-insensitively; only the exact tag is accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == lower)
            .ok_or_else(|| format!("unknown intent '{}'", s))
    }
}

/// Stop words, plus words shared by several colleges' aliases
///
/// A constituent token identifies a college only when it belongs to exactly
/// one of them. "university" or "engineering" still resolve.
pub const GENERIC_TOKENS: &[&str] = &[
    "a", "an", "the", "of", "and", "for", "in", "at", "&",
    "college", "colleges",
];

/// Canonical college names and their alias phrases
pub const ALIASES: &[(&str, &[&str])] = &[
    (
        "BMS Institute of Technology",
        &["bmsit", "bms", "bmsit&m", "bms institute", "bms institute of technology"],
    ),
    (
        "RV College of Engineering",
        &["rvce", "rv", "r.v.", "rv college", "rv college of engineering"],
    ),
    (
        "PES University",
        &["pes", "pesu", "pes university", "pes college"],
    ),
];

/// Split lower-cased text into word tokens
///
/// Letters and digits form tokens; everything else separates them.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// Vocabulary tables used by the resolver and the fallback normalizer
#[derive(Debug, Clone)]
pub struct Lexicon {
    /// Whole alias phrase (lower-case) → canonical name
    phrases: HashMap<String, String>,

    /// Constituent token → canonical names containing it
    tokens: HashMap<String, Vec<String>>,

    /// Keyword → intent
    keywords: HashMap<String, Intent>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    /// Build the built-in college lexicon
    pub fn new() -> Self {
        let mut lexicon = Self {
            phrases: HashMap::new(),
            tokens: HashMap::new(),
            keywords: HashMap::new(),
        };

        for (name, aliases) in ALIASES {
            lexicon.add_entity(name, aliases);
        }

        for intent in Intent::ALL {
            for keyword in intent.keywords() {
                lexicon.keywords.insert(keyword.to_string(), intent);
            }
        }

        lexicon
    }

    /// Register a canonical entity with its alias phrases
    pub fn add_entity(&mut self, canonical: &str, aliases: &[&str]) {
        let phrases = std::iter::once(canonical).chain(aliases.iter().copied());
        for phrase in phrases {
            let lower = phrase.to_lowercase();
            self.phrases.insert(lower.clone(), canonical.to_string());

            for token in tokenize(&lower) {
                if GENERIC_TOKENS.contains(&token.as_str()) || token.len() < 2 {
                    continue;
                }
                let owners = self.tokens.entry(token).or_default();
                if !owners.iter().any(|owner| owner == canonical) {
                    owners.push(canonical.to_string());
                }
            }
        }
    }

    /// Canonical names whose alias phrases contain `token` as a constituent
    pub fn entities_for_token(&self, token: &str) -> &[String] {
        self.tokens.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Intent selected by an exact keyword token
    pub fn intent_for_token(&self, token: &str) -> Option<Intent> {
        self.keywords.get(token).copied()
    }

    /// Normalize a free-form college mention to its canonical name
    ///
    /// Whole-phrase, case-insensitive lookup against aliases and canonical
    /// names. Unknown strings come back trimmed but otherwise unchanged.
    pub fn normalize_entity(&self, mention: &str) -> String {
        let trimmed = mention.trim();
        self.phrases
            .get(&trimmed.to_lowercase())
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}
