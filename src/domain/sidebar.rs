//! The navigation sidebar: a YAML stream of sections, each with a heading and page entries.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::domain::types::NodeId;

/// Document used when the first page is appended to a site without a sidebar.
pub const DEFAULT_SIDEBAR: &str = "---\nheading: ''\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarEntry {
    pub id: i64,
    pub title: String,
}

impl SidebarEntry {
    pub fn node_id(&self) -> NodeId {
        NodeId(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarSection {
    pub heading: String,
    #[serde(default)]
    pub pages: Vec<SidebarEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidebarParseError {
    #[error("Invalid YAML")]
    Invalid,
    #[error("Invalid YAML, missing key '{0}'")]
    MissingKey(&'static str),
}

/// Parses every document in `text`. Whitespace-only text is an empty sidebar.
pub fn parse_sidebar(text: &str) -> Result<Vec<SidebarSection>, SidebarParseError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut sections = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|_| SidebarParseError::Invalid)?;
        sections.push(parse_section(&value)?);
    }
    Ok(sections)
}

fn parse_section(value: &Value) -> Result<SidebarSection, SidebarParseError> {
    let mapping = value.as_mapping().ok_or(SidebarParseError::Invalid)?;
    let heading = scalar_text(field(mapping, "heading")?)?;

    let pages = match mapping.get("pages") {
        Some(Value::Null) | None if heading.is_empty() => Vec::new(),
        Some(pages) => parse_entries(pages)?,
        None => return Err(SidebarParseError::MissingKey("pages")),
    };

    Ok(SidebarSection { heading, pages })
}

fn parse_entries(value: &Value) -> Result<Vec<SidebarEntry>, SidebarParseError> {
    let items = value.as_sequence().ok_or(SidebarParseError::Invalid)?;
    items
        .iter()
        .map(|item| {
            let mapping = item.as_mapping().ok_or(SidebarParseError::Invalid)?;
            let id = entry_id(field(mapping, "id")?)?;
            let title = scalar_text(field(mapping, "title")?)?;
            Ok(SidebarEntry { id, title })
        })
        .collect()
}

// Hand-edited documents sometimes quote the id.
fn entry_id(value: &Value) -> Result<i64, SidebarParseError> {
    let id = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    id.ok_or(SidebarParseError::Invalid)
}

fn field<'a>(mapping: &'a Mapping, key: &'static str) -> Result<&'a Value, SidebarParseError> {
    mapping.get(key).ok_or(SidebarParseError::MissingKey(key))
}

fn scalar_text(value: &Value) -> Result<String, SidebarParseError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(SidebarParseError::Invalid),
    }
}

/// Writes sections back as a YAML stream, one `---` document per section.
pub fn serialize_sidebar(sections: &[SidebarSection]) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for section in sections {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(section)?);
    }
    Ok(out)
}

/// Appends an entry to the last section, starting an untitled section when there is none.
pub fn append_entry(sections: &mut Vec<SidebarSection>, entry: SidebarEntry) {
    match sections.last_mut() {
        Some(last) => last.pages.push(entry),
        None => sections.push(SidebarSection {
            heading: String::new(),
            pages: vec![entry],
        }),
    }
}

pub fn references(sections: &[SidebarSection], id: NodeId) -> bool {
    sections
        .iter()
        .flat_map(|section| section.pages.iter())
        .any(|entry| entry.id == id.get())
}
