//! Keyword-driven section segmentation.
//!
//! Titles are found with one case-insensitive alternation over the keyword
//! list. A keyword that appears inside running prose (say, "as shown in the
//! Introduction") also opens a section; callers live with that.

use crate::document::Section;
use regex::Regex;

/// Canonical section titles of a research paper, in reading order.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "Abstract",
    "Introduction",
    "Background",
    "Related Work",
    "Literature Review",
    "Materials and Methods",
    "Methodology",
    "Methods",
    "Experiments",
    "Results",
    "Discussion",
    "Limitations",
    "Conclusions",
    "Conclusion",
    "Future Work",
    "Acknowledgements",
    "References",
];

/// Splits text into ordered, titled sections.
#[derive(Debug, Clone)]
pub struct SectionSegmenter {
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl SectionSegmenter {
    /// Build a segmenter over the given canonical titles.
    pub fn new<I, S>(keywords: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(Into::into)
            .filter(|k| !k.trim().is_empty())
            .collect();

        // Longest first so "Conclusions" beats its prefix "Conclusion".
        let mut alternatives: Vec<&str> = keywords.iter().map(String::as_str).collect();
        alternatives.sort_by_key(|k| std::cmp::Reverse(k.len()));

        let pattern = if alternatives.is_empty() {
            None
        } else {
            let body = alternatives
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!("(?i)({body})"))?)
        };

        Ok(Self { keywords, pattern })
    }

    /// Segment `text`. An empty result means no title keyword occurred at all.
    pub fn segment(&self, text: &str) -> Vec<Section> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };

        let titles: Vec<_> = pattern.find_iter(text).collect();
        let mut sections = Vec::with_capacity(titles.len());

        for (i, title) in titles.iter().enumerate() {
            let content_end = titles.get(i + 1).map_or(text.len(), |next| next.start());
            let content = text[title.end()..content_end].trim();
            sections.push(Section::new(self.canonical_title(title.as_str()), content));
        }

        sections
    }

    /// Map a matched token onto the keyword's canonical spelling.
    fn canonical_title(&self, token: &str) -> String {
        let token = token.trim();
        self.keywords
            .iter()
            .find(|k| k.to_lowercase() == token.to_lowercase())
            .cloned()
            .unwrap_or_else(|| token.to_string())
    }
}

impl Default for SectionSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied()).unwrap_or_else(|_| Self {
            keywords: Vec::new(),
            pattern: None,
        })
    }
}
