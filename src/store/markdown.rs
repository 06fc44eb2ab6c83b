//! Parsing for the markdown export layout.
//!
//! Documents are split into heading-delimited entries with pulldown-cmark so
//! headings inside fenced code never start an entry. Inside an entry the
//! layout is line oriented: an optional `* [timestamp] text` lead line,
//! followed by free text and `**Field:**` markers.
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

/// A malformed entry in an export document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {message}")]
pub struct EntryError {
    pub location: String,
    pub message: String,
}

impl EntryError {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }

    fn entry(index: usize, heading: &str, message: impl Into<String>) -> Self {
        Self::new(format!("entry {} ({heading:?})", index + 1), message)
    }
}

pub type ParseResult<T> = Result<T, EntryError>;

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEntry {
    pub timestamp: Option<NaiveDateTime>,
    pub summary: String,
    pub rationale: Option<String>,
    pub implementation_details: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternEntry {
    pub timestamp: Option<NaiveDateTime>,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressItem {
    pub timestamp: Option<NaiveDateTime>,
    pub status: String,
    pub description: String,
    pub children: Vec<ProgressItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomEntry {
    pub timestamp: Option<NaiveDateTime>,
    pub key: String,
    pub value: Value,
}

/// One heading-delimited entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    pub heading: String,
    pub body: &'a str,
}

/// A document split at its entry level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document<'a> {
    /// Source with the title heading removed, used when there are no entries.
    pub untitled: String,
    pub entries: Vec<Entry<'a>>,
}

struct Heading {
    level: u8,
    range: Range<usize>,
    text: String,
}

/// Split a document into entries at the shallowest heading level >= 2.
pub fn split_entries(source: &str) -> Document<'_> {
    let headings = collect_headings(source);

    let title_heading = headings.iter().find(|h| h.level == 1);
    let untitled = match title_heading {
        Some(h) => format!("{}{}", &source[..h.range.start], &source[h.range.end..]),
        None => source.to_string(),
    };

    let Some(entry_level) = headings.iter().map(|h| h.level).filter(|l| *l >= 2).min() else {
        return Document {
            untitled,
            entries: Vec::new(),
        };
    };

    let mut entries = Vec::new();
    for (idx, heading) in headings.iter().enumerate() {
        if heading.level != entry_level {
            continue;
        }
        let end = headings[idx + 1..]
            .iter()
            .find(|next| next.level <= entry_level)
            .map(|next| next.range.start)
            .unwrap_or(source.len());
        entries.push(Entry {
            heading: heading.text.trim().to_string(),
            body: &source[heading.range.end..end],
        });
    }

    Document { untitled, entries }
}

fn collect_headings(source: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;
    for (event, range) in Parser::new(source).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some(Heading {
                    level: level as u8,
                    range,
                    text: String::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                // Setext underlines collide with `---` entry separators.
                if let Some(heading) = current.take().filter(|h| is_atx(source, h)) {
                    headings.push(heading);
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(&text);
                }
            }
            _ => {}
        }
    }
    headings
}

fn is_atx(source: &str, heading: &Heading) -> bool {
    source[heading.range.clone()].trim_start().starts_with('#')
}

/// Parse `product_context.md` / `active_context.md` into a JSON object.
pub fn parse_context(source: &str) -> ParseResult<Map<String, Value>> {
    let doc = split_entries(source);
    let mut content = Map::new();

    if doc.entries.is_empty() {
        let text = strip_rules(&doc.untitled);
        let text = text.trim();
        if text.is_empty() {
            return Err(EntryError::new("document", "no content"));
        }
        content.insert(
            "markdown_content".to_string(),
            Value::String(text.to_string()),
        );
        return Ok(content);
    }

    for (idx, entry) in doc.entries.iter().enumerate() {
        let key = normalize_key(&entry.heading);
        if key.is_empty() {
            return Err(EntryError::entry(
                idx,
                &entry.heading,
                "heading has no usable key",
            ));
        }
        content.insert(key, context_value(entry.body));
    }
    Ok(content)
}

fn context_value(body: &str) -> Value {
    let blocks = top_level_blocks(body);
    if let [BlockKind::Code(code)] = blocks.as_slice() {
        if let Ok(value) = serde_json::from_str::<Value>(code) {
            return value;
        }
    }
    if !blocks.is_empty() && blocks.iter().all(|block| matches!(block, BlockKind::List)) {
        let mut items = Vec::new();
        for node in list_items(body) {
            node.flatten_into(&mut items);
        }
        return Value::Array(items.into_iter().map(Value::String).collect());
    }
    Value::String(strip_rules(body).trim().to_string())
}

/// Parse `decision_log.md`.
pub fn parse_decision_log(source: &str) -> ParseResult<Vec<DecisionEntry>> {
    let doc = split_entries(source);
    let mut decisions = Vec::with_capacity(doc.entries.len());
    for (idx, entry) in doc.entries.iter().enumerate() {
        let body = strip_rules(entry.body);
        let lead = lead_line(&body).map_err(|msg| EntryError::entry(idx, &entry.heading, msg))?;
        let (timestamp, lead_text, rest) = match lead {
            Some(lead) => (lead.timestamp, Some(lead.text), lead.rest),
            None => (None, None, body.clone()),
        };
        let fields = Fields::parse(&rest);

        let heading_is_summary =
            !entry.heading.is_empty() && !entry.heading.eq_ignore_ascii_case("decision");
        let summary = match lead_text.filter(|text| !text.is_empty()) {
            Some(text) => text,
            None if heading_is_summary => entry.heading.clone(),
            None => return Err(EntryError::entry(idx, &entry.heading, "missing summary")),
        };
        let rationale = fields
            .get("rationale")
            .or_else(|| non_empty(fields.free_text.clone()));

        decisions.push(DecisionEntry {
            timestamp,
            summary,
            rationale,
            implementation_details: fields.get("implementation details"),
            tags: parse_tags(fields.get("tags").as_deref()),
        });
    }
    Ok(decisions)
}

/// Parse `system_patterns.md`.
pub fn parse_system_patterns(source: &str) -> ParseResult<Vec<PatternEntry>> {
    let doc = split_entries(source);
    let mut patterns = Vec::with_capacity(doc.entries.len());
    for (idx, entry) in doc.entries.iter().enumerate() {
        if entry.heading.is_empty() {
            return Err(EntryError::entry(
                idx,
                &entry.heading,
                "pattern has no name",
            ));
        }
        let body = strip_rules(entry.body);
        let lead = lead_line(&body).map_err(|msg| EntryError::entry(idx, &entry.heading, msg))?;
        let (timestamp, rest) = match lead {
            Some(lead) => {
                let rest = if lead.text.is_empty() {
                    lead.rest
                } else {
                    format!("{}\n{}", lead.text, lead.rest)
                };
                (lead.timestamp, rest)
            }
            None => (None, body.clone()),
        };
        let fields = Fields::parse(&rest);
        patterns.push(PatternEntry {
            timestamp,
            name: entry.heading.clone(),
            description: fields
                .get("description")
                .or_else(|| non_empty(fields.free_text.clone())),
            tags: parse_tags(fields.get("tags").as_deref()),
        });
    }
    Ok(patterns)
}

/// Parse `progress_log.md`; list nesting becomes parent/child links.
pub fn parse_progress_log(source: &str) -> ParseResult<Vec<ProgressItem>> {
    list_items(source)
        .iter()
        .enumerate()
        .map(|(idx, node)| progress_item(node, &format!("item {}", idx + 1)))
        .collect()
}

fn progress_item(node: &ListNode, location: &str) -> ParseResult<ProgressItem> {
    static ITEM: OnceLock<Regex> = OnceLock::new();
    static ID_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let item_re = ITEM.get_or_init(|| {
        Regex::new(r"^\s*(?:\[([^\]]*)\]\s*)?([^:\[\]]+?)\s*:\s*(.*?)\s*$")
            .expect("regex for progress items")
    });
    let id_re = ID_SUFFIX.get_or_init(|| {
        Regex::new(r"\s*\(ID:\s*\d+\)\s*$").expect("regex for progress ids")
    });

    let text = node.text.trim();
    let Some(caps) = item_re.captures(text) else {
        let message = format!("expected `STATUS: description`, got {text:?}");
        return Err(EntryError::new(location, message));
    };
    let timestamp = match caps.get(1).map(|m| m.as_str().trim()) {
        Some(raw) if !raw.is_empty() => {
            Some(parse_timestamp(raw).map_err(|msg| EntryError::new(location, msg))?)
        }
        _ => None,
    };
    let status = caps
        .get(2)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join("_"))
        .unwrap_or_default()
        .to_uppercase();
    if status.is_empty() {
        return Err(EntryError::new(location, "missing status"));
    }
    let description = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    let description = id_re.replace(description, "").trim().to_string();
    if description.is_empty() {
        return Err(EntryError::new(location, "missing description"));
    }

    let children = node
        .children
        .iter()
        .enumerate()
        .map(|(idx, child)| progress_item(child, &format!("{location}.{}", idx + 1)))
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(ProgressItem {
        timestamp,
        status,
        description,
        children,
    })
}

/// Parse one `custom_data/<category>.md` file.
pub fn parse_custom_data(source: &str) -> ParseResult<Vec<CustomEntry>> {
    let doc = split_entries(source);
    let mut entries = Vec::with_capacity(doc.entries.len());
    for (idx, entry) in doc.entries.iter().enumerate() {
        if entry.heading.is_empty() {
            return Err(EntryError::entry(idx, &entry.heading, "entry has no key"));
        }
        let heading = &entry.heading;
        let lead = lead_line(entry.body).map_err(|msg| EntryError::entry(idx, heading, msg))?;
        let (timestamp, rest) = match lead {
            Some(lead) => (lead.timestamp, lead.rest),
            None => (None, entry.body.to_string()),
        };
        let value = custom_value(&rest)
            .ok_or_else(|| EntryError::entry(idx, &entry.heading, "empty value"))?;
        entries.push(CustomEntry {
            timestamp,
            key: entry.heading.clone(),
            value,
        });
    }
    Ok(entries)
}

/// First JSON code block, else the whole body as text.
fn custom_value(body: &str) -> Option<Value> {
    let json = top_level_blocks(body)
        .into_iter()
        .find_map(|block| match block {
            BlockKind::Code(code) => serde_json::from_str::<Value>(&code).ok(),
            _ => None,
        });
    if json.is_some() {
        return json;
    }
    let text = strip_rules(body);
    non_empty(text.trim().to_string()).map(Value::String)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockKind {
    Code(String),
    List,
    Other,
}

fn top_level_blocks(source: &str) -> Vec<BlockKind> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut code: Option<String> = None;
    for event in Parser::new(source) {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    match tag {
                        Tag::CodeBlock(_) => code = Some(String::new()),
                        Tag::List(_) => blocks.push(BlockKind::List),
                        _ => blocks.push(BlockKind::Other),
                    }
                }
                depth += 1;
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                if depth == 0 && matches!(end, TagEnd::CodeBlock) {
                    if let Some(text) = code.take() {
                        blocks.push(BlockKind::Code(text));
                    }
                }
            }
            Event::Text(text) => {
                if let Some(buf) = code.as_mut() {
                    buf.push_str(&text);
                } else if depth == 0 {
                    blocks.push(BlockKind::Other);
                }
            }
            Event::Rule => {}
            _ if depth == 0 => blocks.push(BlockKind::Other),
            _ => {}
        }
    }
    blocks
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ListNode {
    text: String,
    children: Vec<ListNode>,
}

impl ListNode {
    fn flatten_into(&self, out: &mut Vec<String>) {
        let text = self.text.trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
        for child in &self.children {
            child.flatten_into(out);
        }
    }
}

fn list_items(source: &str) -> Vec<ListNode> {
    let mut roots = Vec::new();
    let mut stack: Vec<ListNode> = Vec::new();
    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::Item) => stack.push(ListNode::default()),
            Event::End(TagEnd::Item) => {
                if let Some(node) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => roots.push(node),
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(node) = stack.last_mut() {
                    node.text.push(' ');
                }
            }
            _ => {}
        }
    }
    roots
}

struct LeadLine {
    timestamp: Option<NaiveDateTime>,
    text: String,
    rest: String,
}

/// Split off a leading `* [timestamp] text` bullet, if the entry has one.
fn lead_line(body: &str) -> Result<Option<LeadLine>, String> {
    static LEAD: OnceLock<Regex> = OnceLock::new();
    let lead_re = LEAD.get_or_init(|| {
        Regex::new(r"^\s*[*-]\s+\[([^\]]*)\]\s*(.*?)\s*$").expect("regex for lead lines")
    });

    let mut lines = body.lines();
    for line in lines.by_ref() {
        if line.trim().is_empty() || is_rule(line) {
            continue;
        }
        let Some(caps) = lead_re.captures(line) else {
            return Ok(None);
        };
        let raw = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let timestamp = if raw.is_empty() {
            None
        } else {
            Some(parse_timestamp(raw)?)
        };
        let text = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let rest = lines.collect::<Vec<_>>().join("\n");
        return Ok(Some(LeadLine {
            timestamp,
            text,
            rest,
        }));
    }
    Ok(None)
}

/// Parse the timestamp forms used in exports.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    if let Some(ts) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(ts);
    }
    Err(format!("unrecognized timestamp {raw:?}"))
}

struct Fields {
    free_text: String,
    values: Vec<(String, String)>,
}

impl Fields {
    fn parse(text: &str) -> Self {
        static MARKER: OnceLock<Regex> = OnceLock::new();
        let marker_re = MARKER.get_or_init(|| {
            Regex::new(r"^\s*\*\*(?:([^*:]+):\*\*|([^*:]+)\*\*:)\s*(.*)$")
                .expect("regex for field markers")
        });

        let mut free = Vec::new();
        let mut values: Vec<(String, Vec<String>)> = Vec::new();
        for line in text.lines() {
            if let Some(caps) = marker_re.captures(line) {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().trim().to_lowercase())
                    .unwrap_or_default();
                let first = caps
                    .get(3)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                values.push((name, vec![first]));
            } else if let Some((_, lines)) = values.last_mut() {
                lines.push(line.to_string());
            } else {
                free.push(line);
            }
        }

        Self {
            free_text: free.join("\n").trim().to_string(),
            values: values
                .into_iter()
                .map(|(name, lines)| (name, lines.join("\n").trim().to_string()))
                .collect(),
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .and_then(|(_, value)| non_empty(value.clone()))
    }
}

fn parse_tags(raw: Option<&str>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.unwrap_or_default().split(',') {
        let tag = tag.trim().trim_matches('`').trim();
        if !tag.is_empty() && !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn strip_rules(text: &str) -> String {
    text.lines()
        .filter(|line| !is_rule(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_rule(line: &str) -> bool {
    matches!(line.trim(), "---" | "***" | "___")
}

/// Lowercase a heading and collapse non-alphanumeric runs to `_`.
pub fn normalize_key(heading: &str) -> String {
    let mut key = String::new();
    let mut pending_sep = false;
    for ch in heading.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
#[path = "markdown_tests.rs"]
mod tests;
