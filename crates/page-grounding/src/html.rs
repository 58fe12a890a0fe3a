//! Section extraction from an HTML snapshot of the page.
//!
//! Mirrors what a visitor can see: subtrees that the browser would not render
//! are skipped, and so is the assistant widget itself (marked with
//! `data-chatbot`) so answers never quote the widget's own text.
use scraper::{ElementRef, Html, Node, Selector};

use crate::sections::{Section, SectionCollector, SectionSource};

/// Marker attribute carried by the assistant widget's root element.
pub const WIDGET_MARKER_ATTR: &str = "data-chatbot";

/// Elements browsers render with `display: none` by default.
const NON_RENDERED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// An HTML document captured from the page. Parsed on every
/// [`sections`](SectionSource::sections) call.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    html: String,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }
}

impl SectionSource for HtmlPage {
    fn sections(&self) -> Vec<Section> {
        extract_sections(&self.html)
    }
}

/// Walk the document body depth-first and group visible text under headings.
pub fn extract_sections(html: &str) -> Vec<Section> {
    let document = Html::parse_document(html);
    let body = Selector::parse("body").expect("valid selector");
    let root = document
        .select(&body)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut collector = SectionCollector::new();
    let mut stack = vec![*root];

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => collector.text(text),
            Node::Element(element) => {
                if !is_rendered(element) {
                    continue;
                }
                if is_heading(element.name()) {
                    let heading: String = ElementRef::wrap(node)
                        .map(|el| el.text().collect())
                        .unwrap_or_default();
                    collector.heading(&heading);
                }
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }

    collector.finish()
}

fn is_heading(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn is_rendered(element: &scraper::node::Element) -> bool {
    if NON_RENDERED_TAGS.contains(&element.name()) {
        return false;
    }
    if element.attr(WIDGET_MARKER_ATTR).is_some() || element.attr("hidden").is_some() {
        return false;
    }
    !element.attr("style").is_some_and(style_hides)
}

/// True when an inline style declares `display: none` or `visibility: hidden`.
fn style_hides(style: &str) -> bool {
    style.split(';').any(|declaration| {
        let Some((property, value)) = declaration.split_once(':') else {
            return false;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.to_ascii_lowercase();
        let value = value.trim().trim_end_matches("!important").trim();
        (property == "display" && value == "none")
            || (property == "visibility" && value == "hidden")
    })
}
