use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Heading assigned to text that appears before any heading.
pub const DEFAULT_HEADING: &str = "Page Content";

/// Heading used when a heading element has no text of its own.
pub const EMPTY_HEADING_FALLBACK: &str = "Section";

/// A run of page text under the nearest preceding heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    pub heading: String,
    /// Text fragments joined with single spaces. Never empty.
    pub content: String,
}

impl Section {
    pub fn new(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }
}

/// Anything that can produce the currently visible page text as sections.
///
/// Called once per question; implementations should re-read their surface on
/// every call since the page may change between questions.
pub trait SectionSource {
    fn sections(&self) -> Vec<Section>;
}

impl SectionSource for [Section] {
    fn sections(&self) -> Vec<Section> {
        self.to_vec()
    }
}

impl SectionSource for Vec<Section> {
    fn sections(&self) -> Vec<Section> {
        self.clone()
    }
}

impl<T: SectionSource + ?Sized> SectionSource for &T {
    fn sections(&self) -> Vec<Section> {
        (**self).sections()
    }
}

/// Heading/buffer state machine behind section extraction.
///
/// Feed it headings and text fragments in document order, then call
/// [`finish`](Self::finish).
#[derive(Debug)]
pub struct SectionCollector {
    sections: Vec<Section>,
    heading: String,
    buffer: Vec<String>,
}

impl Default for SectionCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionCollector {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            heading: DEFAULT_HEADING.to_string(),
            buffer: Vec::new(),
        }
    }

    /// Close the pending text under the previous heading and switch headings.
    pub fn heading(&mut self, text: &str) {
        self.flush();
        let text = text.trim();
        self.heading = if text.is_empty() {
            EMPTY_HEADING_FALLBACK.to_string()
        } else {
            text.to_string()
        };
    }

    pub fn text(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            self.buffer.push(fragment.to_string());
        }
    }

    pub fn finish(mut self) -> Vec<Section> {
        self.flush();
        self.sections
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let content = self.buffer.join(" ");
        self.buffer.clear();
        self.sections.push(Section {
            heading: self.heading.clone(),
            content,
        });
    }
}
