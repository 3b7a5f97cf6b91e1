//! Fallacy taxonomy
//!
//! Read-only catalogue the informal-fallacy agent classifies against. A
//! built-in table ships with the crate; a JSON file can replace it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid taxonomy file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Taxonomy has no entries")]
    Empty,

    #[error("Duplicate taxonomy key: {0}")]
    DuplicateKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxonomyEntry {
    /// Stable snake_case identifier, e.g. `hasty_generalization`
    pub key: String,
    pub category: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone)]
pub struct FallacyTaxonomy {
    entries: BTreeMap<String, TaxonomyEntry>,
}

fn entry(key: &str, category: &str, name: &str, description: &str, example: &str) -> TaxonomyEntry {
    TaxonomyEntry {
        key: key.to_string(),
        category: category.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        example: example.to_string(),
    }
}

impl FallacyTaxonomy {
    pub fn builtin() -> Self {
        let entries = vec![
            entry(
                "hasty_generalization",
                "induction",
                "Hasty generalization",
                "A general rule is drawn from too few or unrepresentative cases.",
                "Every swan I have seen is white, so all swans are white.",
            ),
            entry(
                "slippery_slope",
                "causation",
                "Slippery slope",
                "A modest first step is claimed to lead inevitably to an extreme outcome without support for each link.",
                "If we allow retakes, soon nobody will study at all.",
            ),
            entry(
                "false_cause",
                "causation",
                "False cause",
                "A causal link is asserted from mere sequence or correlation.",
                "I wore my lucky socks and we won, so the socks made us win.",
            ),
            entry(
                "ad_hominem",
                "relevance",
                "Ad hominem",
                "The arguer is attacked instead of the argument.",
                "You can't trust her budget plan, she failed maths at school.",
            ),
            entry(
                "appeal_to_authority",
                "relevance",
                "Appeal to authority",
                "A claim is accepted because of who asserts it, outside their expertise.",
                "A famous actor says this diet works, so it must.",
            ),
            entry(
                "appeal_to_popularity",
                "relevance",
                "Appeal to popularity",
                "A claim is held true because many people believe it.",
                "Millions use this remedy, so it must be effective.",
            ),
            entry(
                "appeal_to_emotion",
                "relevance",
                "Appeal to emotion",
                "Emotion is substituted for evidence.",
                "Think of the children before you vote against this law.",
            ),
            entry(
                "red_herring",
                "relevance",
                "Red herring",
                "An irrelevant topic diverts attention from the issue at hand.",
                "Why worry about pollution when there is so much crime?",
            ),
            entry(
                "straw_man",
                "misrepresentation",
                "Straw man",
                "An opponent's position is distorted into a weaker one and then refuted.",
                "You want less military spending, so you want us defenceless.",
            ),
            entry(
                "false_dilemma",
                "presumption",
                "False dilemma",
                "Only two options are presented when more exist.",
                "Either you support this policy or you hate progress.",
            ),
            entry(
                "begging_the_question",
                "presumption",
                "Begging the question",
                "The conclusion is assumed in a premise.",
                "This book is true because the book says so.",
            ),
            entry(
                "equivocation",
                "ambiguity",
                "Equivocation",
                "A word shifts meaning between premises.",
                "A feather is light; what is light cannot be dark; so a feather cannot be dark.",
            ),
        ];
        Self {
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    /// Build from entries, refusing empty tables and duplicate keys
    pub fn from_entries(entries: Vec<TaxonomyEntry>) -> Result<Self, TaxonomyError> {
        if entries.is_empty() {
            return Err(TaxonomyError::Empty);
        }
        let mut map = BTreeMap::new();
        for e in entries {
            if map.contains_key(&e.key) {
                return Err(TaxonomyError::DuplicateKey(e.key));
            }
            map.insert(e.key.clone(), e);
        }
        Ok(Self { entries: map })
    }

    /// Load a JSON array of entries
    pub fn from_json_file(path: &Path) -> Result<Self, TaxonomyError> {
        let data = std::fs::read_to_string(path)?;
        let entries: Vec<TaxonomyEntry> = serde_json::from_str(&data)?;
        let taxonomy = Self::from_entries(entries)?;
        tracing::info!(path = %path.display(), entries = taxonomy.len(), "loaded fallacy taxonomy");
        Ok(taxonomy)
    }

    pub fn get(&self, key: &str) -> Option<&TaxonomyEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TaxonomyEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Category name -> keys in that category
    pub fn categories(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut out: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for e in self.entries.values() {
            out.entry(e.category.as_str()).or_default().push(e.key.as_str());
        }
        out
    }

    /// Case-insensitive match on key, name or description
    pub fn search(&self, term: &str) -> Vec<&TaxonomyEntry> {
        let term = term.to_lowercase();
        self.entries
            .values()
            .filter(|e| {
                e.key.contains(&term)
                    || e.name.to_lowercase().contains(&term)
                    || e.description.to_lowercase().contains(&term)
            })
            .collect()
    }
}

impl Default for FallacyTaxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}
