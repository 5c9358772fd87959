//! Explicit document model for the field mapper.
//!
//! The editable HTML is parsed into an ordered list of nodes:
//!
//! - `Markup`: a raw tag, contributing nothing to the plain text;
//! - `Text`: decoded character data;
//! - `Marker`: a bound placeholder, rendered as a `field-placeholder` span whose
//!   text is `{{field}}`.
//!
//! Positions are byte offsets into the concatenated plain text (see
//! [`MappedDocument::text`]). Markers are atomic: no position may rest inside
//! one, and parsing flattens nested markers so they can never nest.

use super::error::MapperError;
use crate::helpers::{escape_html, floor_char_boundary, unescape_html};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Class carried by every marker element.
pub const MARKER_CLASS: &str = "field-placeholder";

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex")
});

static LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("literal regex")
});

/// A placeholder bound to a location in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub instance_id: String,
    pub field: String,
    /// Text the marker replaced; restored when the marker is removed.
    pub original_text: String,
}

impl Marker {
    pub fn new(field: &str, original_text: &str) -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            field: field.to_string(),
            original_text: original_text.to_string(),
        }
    }

    /// The marker's visible text, `{{field}}`.
    pub fn display_text(&self) -> String {
        format!("{{{{{}}}}}", self.field)
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<span class="{}" data-field="{}" data-instance-id="{}" data-original-text="{}" contenteditable="false">{}</span>"#,
            MARKER_CLASS,
            escape_html(&self.field),
            escape_html(&self.instance_id),
            escape_html(&self.original_text),
            escape_html(&self.display_text()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Markup(String),
    Text(String),
    Marker(Marker),
}

impl Node {
    fn text_len(&self) -> usize {
        match self {
            Node::Markup(_) => 0,
            Node::Text(text) => text.len(),
            Node::Marker(marker) => marker.display_text().len(),
        }
    }

    fn is_text_bearing(&self) -> bool {
        !matches!(self, Node::Markup(_))
    }
}

/// Where a marker sits in plain-text coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpan {
    pub instance_id: String,
    pub field: String,
    pub start: usize,
    pub end: usize,
}

/// The edit a pointer interaction asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditPlan {
    /// Collapsed cursor: insert a marker at this offset.
    InsertAt(usize),
    /// Non-empty selection: replace the range with a marker.
    Replace { start: usize, end: usize },
    /// The position falls on an existing marker.
    ClickedMarker(String),
}

/// Ordered text-or-marker model of one editable HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedDocument {
    nodes: Vec<Node>,
    revision: u64,
}

impl MappedDocument {
    /// Parses editor HTML, recognizing `field-placeholder` spans as markers.
    pub fn parse(html: &str) -> Self {
        let tokens = tokenize(html);
        let mut nodes = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                Token::Text(text) => nodes.push(Node::Text(unescape_html(text))),
                Token::Tag(tag) if is_marker_open(tag) => {
                    let (close, inner) = find_marker_close(&tokens, i);
                    match marker_from_tag(tag, &inner) {
                        Some(marker) => {
                            nodes.push(Node::Marker(marker));
                            i = close;
                        }
                        None => nodes.push(Node::Markup(tag.to_string())),
                    }
                }
                Token::Tag(tag) => nodes.push(Node::Markup(tag.to_string())),
            }
            i += 1;
        }
        let mut document = Self { nodes, revision: 0 };
        document.merge_text();
        document
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for node in &self.nodes {
            match node {
                Node::Markup(tag) => html.push_str(tag),
                Node::Text(text) => html.push_str(&escape_text(text)),
                Node::Marker(marker) => html.push_str(&marker.to_html()),
            }
        }
        html
    }

    /// Concatenated plain text; markers contribute their `{{field}}` text.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.nodes {
            match node {
                Node::Markup(_) => {}
                Node::Text(t) => text.push_str(t),
                Node::Marker(marker) => text.push_str(&marker.display_text()),
            }
        }
        text
    }

    pub fn text_len(&self) -> usize {
        self.nodes.iter().map(Node::text_len).sum()
    }

    /// Incremented by every mutation; pending ranges compare against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Marker(marker) => Some(marker),
            _ => None,
        })
    }

    pub fn marker(&self, instance_id: &str) -> Option<&Marker> {
        self.markers().find(|m| m.instance_id == instance_id)
    }

    /// Marker positions in plain-text coordinates, in document order.
    pub fn marker_layout(&self) -> Vec<MarkerSpan> {
        let mut spans = Vec::new();
        let mut pos = 0;
        for node in &self.nodes {
            let len = node.text_len();
            if let Node::Marker(marker) = node {
                spans.push(MarkerSpan {
                    instance_id: marker.instance_id.clone(),
                    field: marker.field.clone(),
                    start: pos,
                    end: pos + len,
                });
            }
            pos += len;
        }
        spans
    }

    pub fn marker_span(&self, instance_id: &str) -> Option<MarkerSpan> {
        self.marker_layout()
            .into_iter()
            .find(|span| span.instance_id == instance_id)
    }

    /// Plain text in `[start, end)`, or `None` when the range is invalid.
    pub fn text_at(&self, start: usize, end: usize) -> Option<String> {
        let text = self.text();
        if start > end || end > text.len() {
            return None;
        }
        text.get(start..end).map(str::to_string)
    }

    /// Moves an offset that lands inside a marker to the nearer marker edge.
    ///
    /// Ties go after the marker. Offsets are clamped to the text and to a char
    /// boundary.
    pub fn normalize_offset(&self, offset: usize) -> usize {
        let text = self.text();
        let offset = floor_char_boundary(&text, offset);
        for span in self.marker_layout() {
            if span.start < offset && offset < span.end {
                return if offset - span.start < span.end - offset {
                    span.start
                } else {
                    span.end
                };
            }
        }
        offset
    }

    /// Maps a pointer interaction onto an edit.
    ///
    /// A collapsed position strictly inside a marker targets that marker; a
    /// selection touching any marker content is rejected.
    pub fn plan_edit(&self, start: usize, end: usize) -> Result<EditPlan, MapperError> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let text = self.text();
        for offset in [start, end] {
            if offset > text.len() || !text.is_char_boundary(offset) {
                return Err(MapperError::OffsetOutOfBounds {
                    offset,
                    len: text.len(),
                });
            }
        }

        let layout = self.marker_layout();
        if start == end {
            return match layout.iter().find(|s| s.start < start && start < s.end) {
                Some(span) => Ok(EditPlan::ClickedMarker(span.instance_id.clone())),
                None => Ok(EditPlan::InsertAt(start)),
            };
        }
        if layout.iter().any(|s| s.start < end && s.end > start) {
            return Err(MapperError::SelectionOverlapsMarker);
        }
        Ok(EditPlan::Replace { start, end })
    }

    /// Inserts `marker` at a collapsed position.
    pub fn insert_marker(&mut self, offset: usize, marker: Marker) -> Result<(), MapperError> {
        let index = self.split_at(offset)?;
        self.nodes.insert(index, Node::Marker(marker));
        self.touch();
        Ok(())
    }

    /// Replaces the plain text in `[start, end)` with `marker`.
    ///
    /// Markup inside the range is kept so element structure survives.
    pub fn replace_range(
        &mut self,
        start: usize,
        end: usize,
        marker: Marker,
    ) -> Result<(), MapperError> {
        match self.plan_edit(start, end)? {
            EditPlan::Replace { start, end } => {
                let first = self.split_at(start)?;
                let last = self.split_at(end)?;
                let mut index = 0;
                self.nodes.retain(|node| {
                    let keep = index < first || index >= last || !matches!(node, Node::Text(_));
                    index += 1;
                    keep
                });
                self.nodes.insert(first, Node::Marker(marker));
                self.merge_text();
                self.touch();
                Ok(())
            }
            EditPlan::InsertAt(offset) => self.insert_marker(offset, marker),
            EditPlan::ClickedMarker(instance_id) => Err(MapperError::InsideMarker {
                offset: start,
                instance_id,
            }),
        }
    }

    /// Appends a marker after the last text, padded with spaces.
    ///
    /// This is the recovery path when a stored position can no longer be used.
    pub fn append_marker(&mut self, marker: Marker) {
        let index = self
            .nodes
            .iter()
            .rposition(Node::is_text_bearing)
            .map(|i| i + 1)
            .unwrap_or(self.nodes.len());
        self.nodes.splice(
            index..index,
            [
                Node::Text(" ".to_string()),
                Node::Marker(marker),
                Node::Text(" ".to_string()),
            ],
        );
        self.merge_text();
        self.touch();
    }

    /// Swaps the field of an existing marker, keeping its position and original text.
    pub fn replace_marker(&mut self, instance_id: &str, replacement: Marker) -> Result<(), MapperError> {
        let slot = self
            .nodes
            .iter_mut()
            .find(|node| matches!(node, Node::Marker(m) if m.instance_id == instance_id))
            .ok_or_else(|| MapperError::UnknownInstance(instance_id.to_string()))?;
        *slot = Node::Marker(replacement);
        self.touch();
        Ok(())
    }

    /// Removes one marker, restoring the text it replaced.
    pub fn remove_marker(&mut self, instance_id: &str) -> Option<Marker> {
        let index = self
            .nodes
            .iter()
            .position(|node| matches!(node, Node::Marker(m) if m.instance_id == instance_id))?;
        let removed = match std::mem::replace(&mut self.nodes[index], Node::Text(String::new())) {
            Node::Marker(marker) => marker,
            _ => return None,
        };
        self.nodes[index] = Node::Text(removed.original_text.clone());
        self.merge_text();
        self.touch();
        Some(removed)
    }

    /// Removes every marker bound to `field`.
    pub fn remove_field(&mut self, field: &str) -> Vec<Marker> {
        let ids: Vec<String> = self
            .markers()
            .filter(|m| m.field == field)
            .map(|m| m.instance_id.clone())
            .collect();
        ids.iter().filter_map(|id| self.remove_marker(id)).collect()
    }

    /// Ensures a node boundary at `offset` and returns the index to insert at.
    fn split_at(&mut self, offset: usize) -> Result<usize, MapperError> {
        let len = self.text_len();
        let mut pos = 0;
        for index in 0..self.nodes.len() {
            let node_len = self.nodes[index].text_len();
            if node_len == 0 {
                continue;
            }
            if offset == pos {
                return Ok(index);
            }
            if offset < pos + node_len {
                return match &self.nodes[index] {
                    Node::Text(text) => {
                        let at = offset - pos;
                        if !text.is_char_boundary(at) {
                            return Err(MapperError::OffsetOutOfBounds { offset, len });
                        }
                        let tail = text[at..].to_string();
                        let head = text[..at].to_string();
                        self.nodes[index] = Node::Text(head);
                        self.nodes.insert(index + 1, Node::Text(tail));
                        Ok(index + 1)
                    }
                    Node::Marker(marker) => Err(MapperError::InsideMarker {
                        offset,
                        instance_id: marker.instance_id.clone(),
                    }),
                    Node::Markup(_) => unreachable!("markup has no text length"),
                };
            }
            pos += node_len;
        }
        if offset == pos {
            return Ok(self
                .nodes
                .iter()
                .rposition(|node| node.text_len() > 0)
                .map(|i| i + 1)
                .unwrap_or(self.nodes.len()));
        }
        Err(MapperError::OffsetOutOfBounds { offset, len })
    }

    /// Joins adjacent text nodes and drops empty ones.
    fn merge_text(&mut self) {
        let mut merged: Vec<Node> = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.drain(..) {
            match node {
                Node::Text(text) if text.is_empty() => {}
                Node::Text(text) => match merged.last_mut() {
                    Some(Node::Text(previous)) => previous.push_str(&text),
                    _ => merged.push(Node::Text(text)),
                },
                other => merged.push(other),
            }
        }
        self.nodes = merged;
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Moves the revision beyond `previous` after the document was re-parsed.
    pub fn advance_past(&mut self, previous: u64) {
        self.revision = self.revision.max(previous) + 1;
    }
}

/// Every `{{name}}` literal in an HTML string, bare or inside a marker.
pub fn placeholder_literals(html: &str) -> BTreeSet<String> {
    LITERAL
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum Token<'a> {
    Tag(&'a str),
    Text(&'a str),
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;
    while let Some(rel) = html[pos..].find('<') {
        let lt = pos + rel;
        let rest = &html[lt..];
        let end = if rest.starts_with("<!--") {
            rest.find("-->").map(|e| lt + e + 3)
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!') {
            rest.find('>').map(|e| lt + e + 1)
        } else {
            None
        };
        match end {
            Some(end) => {
                if text_start < lt {
                    tokens.push(Token::Text(&html[text_start..lt]));
                }
                tokens.push(Token::Tag(&html[lt..end]));
                text_start = end;
                pos = end;
            }
            None => pos = lt + 1,
        }
    }
    if text_start < html.len() {
        tokens.push(Token::Text(&html[text_start..]));
    }
    tokens
}

fn tag_name(tag: &str) -> (bool, String) {
    let body = tag.trim_start_matches('<');
    let closing = body.starts_with('/');
    let name = body
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (closing, name)
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(tag).find_map(|caps| {
        if caps[1].eq_ignore_ascii_case(name) {
            let value = caps.get(2).or_else(|| caps.get(3))?;
            Some(unescape_html(value.as_str()))
        } else {
            None
        }
    })
}

fn is_marker_open(tag: &str) -> bool {
    let (closing, name) = tag_name(tag);
    if closing || name != "span" || tag.ends_with("/>") {
        return false;
    }
    let has_class = attribute(tag, "class")
        .map(|class| class.split_whitespace().any(|c| c == MARKER_CLASS))
        .unwrap_or(false);
    has_class || attribute(tag, "data-instance-id").is_some()
}

/// Finds the `</span>` closing the marker opened at `open` and collects its
/// inner text. Nested markup, including nested markers, is swallowed.
fn find_marker_close(tokens: &[Token<'_>], open: usize) -> (usize, String) {
    let mut depth = 1;
    let mut inner = String::new();
    let mut j = open + 1;
    while j < tokens.len() {
        match tokens[j] {
            Token::Text(text) => inner.push_str(text),
            Token::Tag(tag) => {
                let (closing, name) = tag_name(tag);
                if name == "span" && !tag.ends_with("/>") {
                    if closing {
                        depth -= 1;
                        if depth == 0 {
                            return (j, unescape_html(&inner));
                        }
                    } else {
                        depth += 1;
                    }
                }
            }
        }
        j += 1;
    }
    (tokens.len(), unescape_html(&inner))
}

fn marker_from_tag(tag: &str, inner: &str) -> Option<Marker> {
    let field = attribute(tag, "data-field")
        .filter(|f| !f.trim().is_empty())
        .or_else(|| LITERAL.captures(inner).map(|caps| caps[1].to_string()))?;
    Some(Marker {
        instance_id: attribute(tag, "data-instance-id")
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        field: field.trim().to_string(),
        original_text: attribute(tag, "data-original-text").unwrap_or_default(),
    })
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(id: &str, field: &str) -> Marker {
        Marker {
            instance_id: id.to_string(),
            field: field.to_string(),
            original_text: String::new(),
        }
    }

    #[test]
    fn parse_round_trips_plain_markup() {
        let html = "<p class=\"a\">Dear <strong>Client</strong>,</p><!-- note --><p>Done &amp; dusted</p>";
        let document = MappedDocument::parse(html);
        assert_eq!(document.to_html(), html);
        assert_eq!(document.text(), "Dear Client,Done & dusted");
    }

    #[test]
    fn markers_are_recognized_with_their_attributes() {
        let html = r#"<p>To <span class="field-placeholder" data-field="email" data-instance-id="m1" data-original-text="CLIENT">{{email}}</span>.</p>"#;
        let document = MappedDocument::parse(html);
        let found = document.marker("m1").unwrap();
        assert_eq!(found.field, "email");
        assert_eq!(found.original_text, "CLIENT");
        assert_eq!(document.text(), "To {{email}}.");
        assert_eq!(
            document.marker_layout(),
            vec![MarkerSpan {
                instance_id: "m1".into(),
                field: "email".into(),
                start: 3,
                end: 12
            }]
        );
    }

    #[test]
    fn nested_markers_are_flattened() {
        let html = concat!(
            r#"<span class="field-placeholder" data-field="outer" data-instance-id="o">"#,
            r#"<span class="field-placeholder" data-field="inner" data-instance-id="i">{{inner}}</span>"#,
            "</span> tail"
        );
        let document = MappedDocument::parse(html);
        assert_eq!(document.markers().count(), 1);
        assert_eq!(document.text(), "{{outer}} tail");
    }

    #[test]
    fn marker_without_field_attribute_uses_its_literal() {
        let document = MappedDocument::parse(r#"<span class="field-placeholder">{{ phone }}</span>"#);
        let only = document.markers().next().unwrap();
        assert_eq!(only.field, "phone");
        assert!(!only.instance_id.is_empty());
    }

    #[test]
    fn stray_angle_brackets_stay_text() {
        let document = MappedDocument::parse("<p>a < b</p>");
        assert_eq!(document.text(), "a < b");
        assert_eq!(document.to_html(), "<p>a &lt; b</p>");
    }

    #[test]
    fn insert_then_remove_restores_text() {
        let mut document = MappedDocument::parse("<p>Hello world</p>");
        let before = document.text();
        document.insert_marker(5, marker("x", "email")).unwrap();
        assert_eq!(document.text(), "Hello{{email}} world");
        document.remove_marker("x").unwrap();
        assert_eq!(document.text(), before);
        assert_eq!(document.to_html(), "<p>Hello world</p>");
    }

    #[test]
    fn replace_range_swaps_selected_text() {
        let mut document = MappedDocument::parse("<p>Dear CLIENT NAME,</p>");
        document
            .replace_range(5, 16, Marker { original_text: "CLIENT NAME".into(), ..marker("h", "email") })
            .unwrap();
        assert_eq!(document.text(), "Dear {{email}},");
        document.remove_marker("h").unwrap();
        assert_eq!(document.text(), "Dear CLIENT NAME,");
    }

    #[test]
    fn replace_range_keeps_markup_inside_the_selection() {
        let mut document = MappedDocument::parse("<p>one <b>two</b> three</p>");
        document.replace_range(2, 11, marker("r", "x")).unwrap();
        assert_eq!(document.text(), "on{{x}}ee");
        assert!(document.to_html().contains("<b></b>"));
    }

    #[test]
    fn selections_touching_markers_are_rejected() {
        let mut document = MappedDocument::parse("<p>ab</p>");
        document.insert_marker(1, marker("m", "f")).unwrap();
        // text: a{{f}}b, marker spans 1..6
        assert_eq!(document.plan_edit(0, 2), Err(MapperError::SelectionOverlapsMarker));
        assert_eq!(document.plan_edit(5, 7), Err(MapperError::SelectionOverlapsMarker));
        assert_eq!(document.plan_edit(0, 1), Ok(EditPlan::Replace { start: 0, end: 1 }));
        assert_eq!(document.plan_edit(3, 3), Ok(EditPlan::ClickedMarker("m".into())));
        assert_eq!(document.plan_edit(6, 6), Ok(EditPlan::InsertAt(6)));
    }

    #[test]
    fn offsets_inside_markers_snap_to_the_nearer_edge() {
        let mut document = MappedDocument::parse("ab");
        document.insert_marker(1, marker("m", "field")).unwrap();
        // marker "{{field}}" spans 1..10
        assert_eq!(document.normalize_offset(2), 1);
        assert_eq!(document.normalize_offset(9), 10);
        assert_eq!(document.normalize_offset(0), 0);
    }

    #[test]
    fn adjacent_insertions_never_nest() {
        let mut document = MappedDocument::parse("<p>x</p>");
        document.insert_marker(1, marker("a", "one")).unwrap();
        document.insert_marker(1, marker("b", "two")).unwrap();
        let end = document.text_len();
        document.insert_marker(end, marker("c", "three")).unwrap();
        assert_eq!(document.text(), "x{{two}}{{one}}{{three}}");
        let reparsed = MappedDocument::parse(&document.to_html());
        assert_eq!(reparsed.markers().count(), 3);
        assert_eq!(reparsed.text(), document.text());
    }

    #[test]
    fn inserting_inside_a_marker_is_an_error() {
        let mut document = MappedDocument::parse("ab");
        document.insert_marker(1, marker("m", "f")).unwrap();
        assert!(matches!(
            document.insert_marker(3, marker("n", "g")),
            Err(MapperError::InsideMarker { .. })
        ));
        assert!(matches!(
            document.insert_marker(99, marker("n", "g")),
            Err(MapperError::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn bulk_removal_removes_every_instance_of_a_field() {
        let mut document = MappedDocument::parse("a b c");
        document.insert_marker(0, marker("1", "email")).unwrap();
        let end = document.text_len();
        document.insert_marker(end, marker("2", "email")).unwrap();
        document.insert_marker(0, marker("3", "phone")).unwrap();
        let removed = document.remove_field("email");
        assert_eq!(removed.len(), 2);
        assert_eq!(document.text(), "{{phone}}a b c");
    }

    #[test]
    fn fallback_append_pads_with_spaces() {
        let mut document = MappedDocument::parse("<p>End.</p>");
        document.append_marker(marker("z", "year"));
        assert_eq!(document.text(), "End. {{year}} ");
        assert!(document.to_html().ends_with(" </p>"));
    }

    #[test]
    fn literals_are_collected_from_html() {
        let html = r#"{{a}} <span class="field-placeholder" data-field="b">{{b}}</span> {{ a }} {not}"#;
        let literals: Vec<String> = placeholder_literals(html).into_iter().collect();
        assert_eq!(literals, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn revision_advances_on_mutation() {
        let mut document = MappedDocument::parse("abc");
        let start = document.revision();
        document.insert_marker(1, marker("m", "f")).unwrap();
        assert!(document.revision() > start);
    }
}
