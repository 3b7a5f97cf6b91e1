//! Heuristic coherence scoring
//!
//! A cheap, model-free signal the informal-fallacy agent can consult before
//! it commits to findings. The score starts from a base value and is moved
//! by four signals: the share of transition words, keywords (more than five
//! letters) that recur, contradiction pairs present together, and a topic
//! change against an optional summary of what came before. The result is
//! clamped to `[0, 1]`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+(?:'\p{L}+)*").expect("WORD regex should compile"));
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("SENTENCE_END regex should compile"));

/// Keywords must be longer than this many characters
const KEYWORD_MIN_CHARS: usize = 5;
/// Words this short are ignored when comparing topics
const TOPIC_MIN_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoherenceError {
    #[error("no words to analyse")]
    EmptyText,
}

/// Weights and thresholds. Fields missing from a config file keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceFactors {
    pub base_score: f64,
    /// Credited to texts of two sentences or more
    pub reference_bonus: f64,
    pub transition_bonus: f64,
    /// Transition words per word above which the bonus applies
    pub transition_ratio_threshold: f64,
    /// Per repeated keyword beyond the first
    pub keyword_bonus: f64,
    /// Per contradiction pair found
    pub contradiction_penalty: f64,
    pub topic_change_penalty: f64,
    /// Share of the summary's words the text must reuse to stay on topic
    pub topic_overlap_threshold: f64,
}

impl Default for CoherenceFactors {
    fn default() -> Self {
        Self {
            base_score: 0.5,
            reference_bonus: 0.1,
            transition_bonus: 0.2,
            transition_ratio_threshold: 0.02,
            keyword_bonus: 0.15,
            contradiction_penalty: -0.4,
            topic_change_penalty: -0.2,
            topic_overlap_threshold: 0.1,
        }
    }
}

/// Analyzer settings; a list given in the config replaces the default list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceConfig {
    pub factors: CoherenceFactors,
    pub transition_words: Vec<String>,
    pub contradiction_pairs: Vec<(String, String)>,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        let words = [
            "therefore",
            "thus",
            "hence",
            "consequently",
            "as a result",
            "moreover",
            "furthermore",
            "in addition",
            "however",
            "nevertheless",
            "because",
            "for example",
            "finally",
        ];
        let pairs = [
            ("i like", "i don't like"),
            ("is true", "is false"),
            ("always", "never"),
            ("possible", "impossible"),
            ("agree", "disagree"),
        ];
        Self {
            factors: CoherenceFactors::default(),
            transition_words: words.iter().map(|w| w.to_string()).collect(),
            contradiction_pairs: pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    VeryCoherent,
    Coherent,
    WeaklyCoherent,
    Incoherent,
}

impl Interpretation {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::VeryCoherent
        } else if score >= 0.5 {
            Self::Coherent
        } else if score >= 0.25 {
            Self::WeaklyCoherent
        } else {
            Self::Incoherent
        }
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VeryCoherent => "very coherent",
            Self::Coherent => "coherent",
            Self::WeaklyCoherent => "weakly coherent",
            Self::Incoherent => "incoherent",
        })
    }
}

/// Raw signals behind a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceSignals {
    pub words: usize,
    pub sentences: usize,
    pub transition_ratio: f64,
    pub repeated_keywords: Vec<String>,
    pub contradictions: Vec<(String, String)>,
    pub topic_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceReport {
    pub score: f64,
    pub interpretation: Interpretation,
    pub signals: CoherenceSignals,
}

struct Phrase {
    text: String,
    re: Regex,
}

impl Phrase {
    fn new(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        let re = Regex::new(&format!(r"\b{}\b", regex::escape(&text))).ok()?;
        Some(Self { text, re })
    }
}

pub struct CoherenceAnalyzer {
    factors: CoherenceFactors,
    transitions: Vec<Phrase>,
    contradictions: Vec<(Phrase, Phrase)>,
}

impl Default for CoherenceAnalyzer {
    fn default() -> Self {
        Self::new(CoherenceConfig::default())
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

fn words(text: &str) -> Vec<&str> {
    WORD.find_iter(text).map(|m| m.as_str()).collect()
}

impl CoherenceAnalyzer {
    pub fn new(config: CoherenceConfig) -> Self {
        let transitions = config.transition_words.iter().filter_map(|w| Phrase::new(w)).collect();
        let contradictions = config
            .contradiction_pairs
            .iter()
            .filter_map(|(a, b)| Some((Phrase::new(a)?, Phrase::new(b)?)))
            .collect();
        Self {
            factors: config.factors,
            transitions,
            contradictions,
        }
    }

    pub fn factors(&self) -> &CoherenceFactors {
        &self.factors
    }

    /// Score `text`, optionally against a summary of the preceding discussion
    pub fn analyze(&self, text: &str, previous_summary: Option<&str>) -> Result<CoherenceReport, CoherenceError> {
        let lowered = normalize(text);
        let tokens = words(&lowered);
        if tokens.is_empty() {
            tracing::warn!("coherence analysis got no words");
            return Err(CoherenceError::EmptyText);
        }
        let f = &self.factors;
        let mut score = f.base_score;

        let sentences = SENTENCE_END
            .split(&lowered)
            .filter(|s| WORD.is_match(s))
            .count();
        if sentences >= 2 {
            score += f.reference_bonus;
        }

        let transitions: usize = self.transitions.iter().map(|p| p.re.find_iter(&lowered).count()).sum();
        let transition_ratio = transitions as f64 / tokens.len() as f64;
        if transition_ratio > f.transition_ratio_threshold {
            score += f.transition_bonus;
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for w in tokens.iter().copied().filter(|w| w.chars().count() > KEYWORD_MIN_CHARS) {
            *counts.entry(w).or_default() += 1;
        }
        let repeated_keywords: Vec<String> = counts
            .into_iter()
            .filter(|(_, n)| *n >= 2)
            .map(|(w, _)| w.to_string())
            .collect();
        score += f.keyword_bonus * repeated_keywords.len().saturating_sub(1) as f64;

        let contradictions: Vec<(String, String)> = self
            .contradictions
            .iter()
            .filter(|(a, b)| a.re.is_match(&lowered) && b.re.is_match(&lowered))
            .map(|(a, b)| (a.text.clone(), b.text.clone()))
            .collect();
        score += f.contradiction_penalty * contradictions.len() as f64;

        let topic_change = previous_summary.map(|s| self.is_topic_change(&tokens, s)).unwrap_or(false);
        if topic_change {
            score += f.topic_change_penalty;
        }

        let score = score.clamp(0.0, 1.0);
        tracing::debug!(
            score,
            transitions,
            keywords = repeated_keywords.len(),
            contradictions = contradictions.len(),
            topic_change,
            "coherence scored"
        );
        Ok(CoherenceReport {
            score,
            interpretation: Interpretation::from_score(score),
            signals: CoherenceSignals {
                words: tokens.len(),
                sentences,
                transition_ratio,
                repeated_keywords,
                contradictions,
                topic_change,
            },
        })
    }

    fn is_topic_change(&self, tokens: &[&str], summary: &str) -> bool {
        let summary = normalize(summary);
        let before: BTreeSet<&str> = words(&summary)
            .into_iter()
            .filter(|w| w.chars().count() > TOPIC_MIN_CHARS)
            .collect();
        if before.is_empty() {
            return false;
        }
        let now: BTreeSet<&str> = tokens
            .iter()
            .copied()
            .filter(|w| w.chars().count() > TOPIC_MIN_CHARS)
            .collect();
        let overlap = before.intersection(&now).count() as f64 / before.len() as f64;
        overlap < self.factors.topic_overlap_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> CoherenceReport {
        CoherenceAnalyzer::default().analyze(text, None).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_empty_input() {
        let analyzer = CoherenceAnalyzer::default();
        assert_eq!(analyzer.analyze("   ", None), Err(CoherenceError::EmptyText));
        assert_eq!(analyzer.analyze("...", None), Err(CoherenceError::EmptyText));
    }

    #[test]
    fn test_single_sentence_gets_base_score() {
        let r = score("Socrates is mortal.");
        assert_close(r.score, 0.5);
        assert_eq!(r.signals.sentences, 1);
        assert_eq!(r.interpretation, Interpretation::Coherent);
    }

    #[test]
    fn test_transition_words() {
        let good = score(
            "The first point is important. Therefore we must consider it. \
             Moreover there is another aspect. Consequently the conclusion is clear.",
        );
        assert_close(good.signals.transition_ratio, 3.0 / 20.0);
        assert_close(good.score, 0.8);
        assert_eq!(good.interpretation, Interpretation::VeryCoherent);

        let bad = score("Point one. Point two. Point three. Point four.");
        assert_eq!(bad.signals.transition_ratio, 0.0);
        assert_close(bad.score, 0.6);
    }

    #[test]
    fn test_repeated_keywords() {
        let r = score("This analysis is a careful analysis. The analysis of the data is careful.");
        assert_eq!(r.signals.repeated_keywords, vec!["analysis", "careful"]);
        assert_close(r.score, 0.75);

        // One recurring keyword earns nothing
        let r = score("I like chocolate. You like chocolate.");
        assert_eq!(r.signals.repeated_keywords, vec!["chocolate"]);
        assert_close(r.score, 0.6);
    }

    #[test]
    fn test_contradictions() {
        let r = score("I like chocolate. But sometimes I don't like chocolate at all.");
        assert_eq!(r.signals.contradictions, vec![("i like".to_string(), "i don't like".to_string())]);
        assert_close(r.score, 0.2);
        assert_eq!(r.interpretation, Interpretation::Incoherent);

        // Typographic apostrophes count too
        let r = score("I like it. I don\u{2019}t like it.");
        assert_eq!(r.signals.contradictions.len(), 1);
    }

    #[test]
    fn test_topic_change() {
        let analyzer = CoherenceAnalyzer::default();
        let summary = "A discussion of fruit and colours.";

        let off = analyzer
            .analyze("Apples are red and delicious. Cars drive fast.", Some(summary))
            .unwrap();
        assert!(off.signals.topic_change);
        assert_close(off.score, 0.4);
        assert_eq!(off.interpretation, Interpretation::WeaklyCoherent);

        let on = analyzer
            .analyze("Fruit comes in many colours. Apples are red fruit.", Some(summary))
            .unwrap();
        assert!(!on.signals.topic_change);
        assert_close(on.score, 0.6);
    }

    #[test]
    fn test_score_is_clamped() {
        let low = score("I like it. It is true. But I don't like it. And it is false.");
        assert_eq!(low.signals.contradictions.len(), 2);
        assert_eq!(low.score, 0.0);
        assert_eq!(low.interpretation, Interpretation::Incoherent);

        let high = score(
            "Argument quality matters. Therefore argument structure matters. \
             Moreover argument quality depends on structure. \
             Consequently quality arguments need structure.",
        );
        assert_eq!(high.signals.repeated_keywords.len(), 4);
        assert_eq!(high.score, 1.0);
        assert_eq!(high.interpretation, Interpretation::VeryCoherent);
    }

    #[test]
    fn test_config_overrides() {
        let config: CoherenceConfig = serde_json::from_str(
            r#"{
                "factors": {"contradiction_penalty": -0.8},
                "contradiction_pairs": [["yes", "no"]]
            }"#,
        )
        .unwrap();
        assert_eq!(config.factors.base_score, 0.5);
        assert_eq!(config.transition_words, CoherenceConfig::default().transition_words);
        let analyzer = CoherenceAnalyzer::new(config);

        // Default pairs are replaced
        let r = analyzer.analyze("I like it. I don't like it.", None).unwrap();
        assert!(r.signals.contradictions.is_empty());
        assert_close(r.score, 0.6);

        let r = analyzer.analyze("Say yes. Say no.", None).unwrap();
        assert_eq!(r.signals.contradictions.len(), 1);
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn test_interpretation_thresholds() {
        assert_eq!(Interpretation::from_score(0.80), Interpretation::VeryCoherent);
        assert_eq!(Interpretation::from_score(0.75), Interpretation::VeryCoherent);
        assert_eq!(Interpretation::from_score(0.74), Interpretation::Coherent);
        assert_eq!(Interpretation::from_score(0.50), Interpretation::Coherent);
        assert_eq!(Interpretation::from_score(0.49), Interpretation::WeaklyCoherent);
        assert_eq!(Interpretation::from_score(0.25), Interpretation::WeaklyCoherent);
        assert_eq!(Interpretation::from_score(0.24), Interpretation::Incoherent);
        assert_eq!(Interpretation::from_score(0.0), Interpretation::Incoherent);
        assert_eq!(Interpretation::WeaklyCoherent.to_string(), "weakly coherent");
    }
}
