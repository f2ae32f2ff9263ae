//! Structured document model.
//!
//! Each corpus file is parsed once into a [`Document`]: an optional YAML frontmatter block
//! followed by an ordered list of [`Section`]s, one per heading. Sections are queried by heading
//! text rather than located with boundary regexes.

use crate::error::ConceptLinkError;
use pulldown_cmark::{Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag, TagEnd};
use serde_yaml::{Mapping, Value};
use std::ops::Range;

const FRONTMATTER_DELIMITER: &str = "---";

pub fn markdown_options() -> Options {
    let mut md_options = Options::empty();
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub fields: Mapping,
}

impl Frontmatter {
    /// Returns a scalar field rendered as a trimmed string. Numbers and booleans are accepted
    /// since hand-written frontmatter frequently uses bare numeric ids.
    pub fn scalar(&self, key: &str) -> Option<String> {
        let rendered = match self.fields.get(key)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        let trimmed = rendered.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn id(&self) -> Option<String> {
        self.scalar("id").or_else(|| self.scalar("rem_id"))
    }

    pub fn title(&self) -> Option<String> {
        self.scalar("title")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// `None` for the text preceding the first heading.
    pub heading: Option<String>,
    /// 0 for the preamble, 1-6 otherwise.
    pub level: u8,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub frontmatter: Frontmatter,
    /// Everything after the frontmatter block.
    pub body: String,
    pub sections: Vec<Section>,
}

impl Document {
    /// Parses `content`. `source` names the document in error messages.
    pub fn parse(source: &str, content: &str) -> Result<Document, ConceptLinkError> {
        let (frontmatter_text, body) = split_frontmatter(content);
        let frontmatter = match frontmatter_text {
            Some(text) => parse_frontmatter(text).map_err(|e| ConceptLinkError::parse(source, e))?,
            None => Frontmatter::default(),
        };
        Ok(Document {
            frontmatter,
            sections: Document::sections_of(body),
            body: body.to_string(),
        })
    }

    /// Splits a markdown body (no frontmatter) into heading-delimited sections.
    pub fn sections_of(body: &str) -> Vec<Section> {
        let mut headings: Vec<(Range<usize>, u8, String)> = Vec::new();
        let mut current: Option<(Range<usize>, u8, String)> = None;

        for (event, range) in MdParser::new_ext(body, markdown_options()).into_offset_iter() {
            match event {
                MdEvent::Start(Tag::Heading { level, .. }) => {
                    debug_assert!(current.is_none());
                    current = Some((range, heading_depth(level), String::new()));
                }
                MdEvent::End(TagEnd::Heading(_)) => {
                    if let Some((range, level, text)) = current.take() {
                        headings.push((range, level, text.trim().to_string()));
                    }
                }
                MdEvent::Text(text) | MdEvent::Code(text) => {
                    if let Some((_, _, accum)) = current.as_mut() {
                        accum.push_str(&text);
                    }
                }
                MdEvent::SoftBreak | MdEvent::HardBreak => {
                    if let Some((_, _, accum)) = current.as_mut() {
                        accum.push(' ');
                    }
                }
                _ => {}
            }
        }

        let mut sections = Vec::with_capacity(headings.len() + 1);
        let preamble_end = headings.first().map(|(r, _, _)| r.start).unwrap_or(body.len());
        if !body[..preamble_end].trim().is_empty() {
            sections.push(Section {
                heading: None,
                level: 0,
                body: body[..preamble_end].to_string(),
            });
        }
        for (idx, (range, level, text)) in headings.iter().enumerate() {
            let end = headings
                .get(idx + 1)
                .map(|(next, _, _)| next.start)
                .unwrap_or(body.len());
            let start = range.end.min(end);
            sections.push(Section {
                heading: Some(text.clone()),
                level: *level,
                body: body[start..end].to_string(),
            });
        }
        sections
    }

    pub fn first_title_heading(&self) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.level == 1)
            .and_then(|s| s.heading.as_deref())
            .filter(|h| !h.is_empty())
    }
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Returns `(frontmatter, body)`. The frontmatter block must open on the first line and be closed
/// by a line containing only `---` (or `...`); otherwise the whole content is body.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(first_line_end) = content.find('\n') else {
        return (None, content);
    };
    if content[..first_line_end].trim_end() != FRONTMATTER_DELIMITER {
        return (None, content);
    }
    let block_start = first_line_end + 1;
    let mut offset = block_start;
    for line in content[block_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == FRONTMATTER_DELIMITER || trimmed == "..." {
            let body_start = (offset + line.len()).min(content.len());
            return (Some(&content[block_start..offset]), &content[body_start..]);
        }
        offset += line.len();
    }
    (None, content)
}

fn parse_frontmatter(text: &str) -> Result<Frontmatter, String> {
    if text.trim().is_empty() {
        return Ok(Frontmatter::default());
    }
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Mapping(fields)) => Ok(Frontmatter { fields }),
        Ok(Value::Null) => Ok(Frontmatter::default()),
        Ok(other) => Err(format!(
            "frontmatter must be a key: value mapping, found {}",
            value_kind(&other)
        )),
        Err(e) => Err(format!("malformed frontmatter: {e}")),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "---
id: Call-Option
title: Call Option
tags: [finance]
---

Intro text linking [[stock]].

# Call Option

Body of the note.

## Related Concepts

- [Put Option](put-option.md) {rel: antonym}

## Notes
Trailing.
";

    #[test]
    fn test_parse_frontmatter_and_sections() {
        let doc = Document::parse("call-option.md", NOTE).unwrap();
        assert_eq!(doc.frontmatter.id().as_deref(), Some("Call-Option"));
        assert_eq!(doc.frontmatter.title().as_deref(), Some("Call Option"));
        assert!(doc.body.starts_with("\nIntro text"));

        let headings: Vec<Option<&str>> =
            doc.sections.iter().map(|s| s.heading.as_deref()).collect();
        assert_eq!(
            headings,
            vec![None, Some("Call Option"), Some("Related Concepts"), Some("Notes")]
        );
        assert_eq!(doc.first_title_heading(), Some("Call Option"));

        let related: Vec<&Section> = doc
            .sections
            .iter()
            .filter(|s| s.heading.as_deref() == Some("Related Concepts"))
            .collect();
        assert_eq!(related.len(), 1);
        assert!(related[0].body.contains("[Put Option](put-option.md)"));
        assert!(!related[0].body.contains("Trailing"));
    }

    #[test]
    fn test_rem_id_fallback_and_numeric_id() {
        let doc = Document::parse("x.md", "---\nrem_id: rem-7\n---\nbody\n").unwrap();
        assert_eq!(doc.frontmatter.id().as_deref(), Some("rem-7"));
        let doc = Document::parse("x.md", "---\nid: 42\n---\nbody\n").unwrap();
        assert_eq!(doc.frontmatter.id().as_deref(), Some("42"));
    }

    #[test]
    fn test_no_frontmatter() {
        let doc = Document::parse("plain.md", "Just [[a]] text\n").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "Just [[a]] text\n");
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].heading, None);
    }

    #[test]
    fn test_unterminated_frontmatter_is_body() {
        let (fm, body) = split_frontmatter("---\nid: a\nno closing\n");
        assert!(fm.is_none());
        assert!(body.starts_with("---"));
    }

    #[test]
    fn test_frontmatter_dot_terminator_and_bom() {
        let (fm, body) = split_frontmatter("\u{feff}---\ntitle: A\n...\n# A\n");
        assert_eq!(fm, Some("title: A\n"));
        assert_eq!(body, "# A\n");

        // A delimiter that is not on the first line does not open a block
        let (fm, body) = split_frontmatter("intro\n---\ntitle: A\n---\n");
        assert!(fm.is_none());
        assert!(body.starts_with("intro"));
    }

    #[test]
    fn test_malformed_frontmatter_is_parse_error() {
        let result = Document::parse("broken.md", "---\nid: [unclosed\n---\nbody\n");
        assert!(matches!(result, Err(ConceptLinkError::Parse { .. })));
        let result = Document::parse("list.md", "---\n- a\n- b\n---\nbody\n");
        assert!(matches!(result, Err(ConceptLinkError::Parse { .. })));
    }

    #[test]
    fn test_empty_frontmatter_block() {
        let doc = Document::parse("empty.md", "---\n---\n# Title\n").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.first_title_heading(), Some("Title"));
    }
}
