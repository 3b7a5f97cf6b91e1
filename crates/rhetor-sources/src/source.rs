//! Source descriptors and the built-in demo texts

use serde::{Deserialize, Serialize};

/// How a source's full text is obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Built-in text, `location` is the key
    Predefined,
    /// Fetched over HTTP(S)
    Url,
    /// Read from the local filesystem
    File,
    /// `location` holds the text itself
    DirectText,
    /// Slice of another source, `location` is the parent id
    Extract,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Predefined => "predefined",
            Self::Url => "url",
            Self::File => "file",
            Self::DirectText => "direct_text",
            Self::Extract => "extract",
        };
        f.write_str(s)
    }
}

/// Where an analysis text comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub id: String,
    pub label: String,
    pub kind: SourceKind,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cached_text: Option<String>,
}

impl SourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: SourceKind,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            location: location.into(),
            start_marker: None,
            end_marker: None,
            cached_text: None,
        }
    }

    /// Set extract markers
    pub fn with_markers(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start_marker = start.map(str::to_string);
        self.end_marker = end.map(str::to_string);
        self
    }

    pub fn cached_text(&self) -> Option<&str> {
        self.cached_text.as_deref()
    }

    /// Populate the cached text. Returns `false` (and changes nothing) if
    /// text was already cached; use [`refresh_cached_text`](Self::refresh_cached_text)
    /// to replace it.
    pub fn set_cached_text(&mut self, text: impl Into<String>) -> bool {
        if self.cached_text.is_some() {
            return false;
        }
        self.cached_text = Some(text.into());
        true
    }

    pub fn refresh_cached_text(&mut self, text: impl Into<String>) {
        self.cached_text = Some(text.into());
    }

    pub fn clear_cached_text(&mut self) {
        self.cached_text = None;
    }
}

const SWANS: &str = "All swans I have seen are white, therefore all swans are white.";

const SLIPPERY_SLOPE: &str = "If we allow students to retake one exam, soon they will demand to \
retake every exam, then grades will mean nothing, and eventually the diploma itself will be \
worthless. We must therefore refuse all retakes.";

const AD_HOMINEM: &str = "My opponent claims the budget is unbalanced. But he was caught \
speeding last year, so why should anyone trust his numbers? The budget is fine.";

const SOCRATES: &str = "All men are mortal. Socrates is a man. Therefore Socrates is mortal.";

/// Look up a built-in text by key
pub fn predefined_text(key: &str) -> Option<&'static str> {
    match key {
        "swans" => Some(SWANS),
        "slippery_slope" => Some(SLIPPERY_SLOPE),
        "ad_hominem" => Some(AD_HOMINEM),
        "socrates" => Some(SOCRATES),
        _ => None,
    }
}

/// The in-memory default set used when no configuration blob is available
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new("demo-swans", "Swans (induction)", SourceKind::Predefined, "swans"),
        SourceDescriptor::new(
            "demo-retakes",
            "Exam retakes (slippery slope)",
            SourceKind::Predefined,
            "slippery_slope",
        ),
        SourceDescriptor::new(
            "demo-budget",
            "Budget debate (ad hominem)",
            SourceKind::Predefined,
            "ad_hominem",
        ),
        SourceDescriptor::new(
            "demo-socrates",
            "Socrates syllogism",
            SourceKind::Predefined,
            "socrates",
        ),
    ]
}
