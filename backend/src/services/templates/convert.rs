//! DOCX -> HTML conversion for uploaded templates.
//!
//! Walks `word/document.xml` structurally with `roxmltree`:
//!
//! - paragraphs become `<p>`, or `<h1>`..`<h3>` for `Title`/`HeadingN` styles;
//! - bold, italic and underline runs become `<strong>`, `<em>`, `<u>`, and
//!   neighbouring runs with identical formatting are merged first;
//! - `<w:br/>` becomes `<br>`, `<w:tab/>` a single space;
//! - tables become `<table>` with one `<td>` per cell.
//!
//! Text is HTML-escaped and every `{name}` token is rewritten to the template
//! form `{{name}}`.

use super::extract::{read_part, DOCUMENT_PART};
use crate::error::AppError;
use common::helpers::escape_html;
use regex::Regex;
use roxmltree::{Document, Node};
use std::sync::LazyLock;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("token regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunFormat {
    bold: bool,
    italic: bool,
    underline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(RunFormat, String),
    Break,
}

/// Converts an uploaded `.docx` into template HTML.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, AppError> {
    let xml = read_part(bytes, DOCUMENT_PART)?;
    document_xml_to_html(&xml)
}

pub fn document_xml_to_html(xml: &str) -> Result<String, AppError> {
    let doc = Document::parse(xml)
        .map_err(|e| AppError::InvalidDocumentFormat(format!("malformed {}: {}", DOCUMENT_PART, e)))?;
    let body = doc
        .descendants()
        .find(|n| is_w(n, "body"))
        .ok_or_else(|| AppError::InvalidDocumentFormat("document has no body".to_string()))?;

    let mut html = String::new();
    render_blocks(body, &mut html);
    Ok(html)
}

fn render_blocks(container: Node<'_, '_>, html: &mut String) {
    for child in container.children().filter(Node::is_element) {
        if is_w(&child, "p") {
            render_paragraph(child, html);
        } else if is_w(&child, "tbl") {
            render_table(child, html);
        } else if is_w(&child, "sdt") {
            if let Some(content) = child.children().find(|n| is_w(n, "sdtContent")) {
                render_blocks(content, html);
            }
        }
    }
}

fn render_paragraph(paragraph: Node<'_, '_>, html: &mut String) {
    let tag = heading_level(paragraph)
        .map(|level| format!("h{}", level))
        .unwrap_or_else(|| "p".to_string());

    html.push('<');
    html.push_str(&tag);
    html.push('>');
    for segment in merge_segments(collect_segments(paragraph)) {
        match segment {
            Segment::Break => html.push_str("<br>"),
            Segment::Text(format, text) => {
                let text = rewrite_tokens(&escape_html(&text));
                if format.bold {
                    html.push_str("<strong>");
                }
                if format.italic {
                    html.push_str("<em>");
                }
                if format.underline {
                    html.push_str("<u>");
                }
                html.push_str(&text);
                if format.underline {
                    html.push_str("</u>");
                }
                if format.italic {
                    html.push_str("</em>");
                }
                if format.bold {
                    html.push_str("</strong>");
                }
            }
        }
    }
    html.push_str("</");
    html.push_str(&tag);
    html.push('>');
}

fn render_table(table: Node<'_, '_>, html: &mut String) {
    html.push_str("<table>");
    for row in table.children().filter(|n| is_w(n, "tr")) {
        html.push_str("<tr>");
        for cell in row.children().filter(|n| is_w(n, "tc")) {
            html.push_str("<td>");
            render_blocks(cell, html);
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
}

/// `Title`/`Heading1` -> 1, `Heading2` -> 2, deeper headings -> 3.
fn heading_level(paragraph: Node<'_, '_>) -> Option<u8> {
    let style = paragraph
        .children()
        .find(|n| is_w(n, "pPr"))?
        .children()
        .find(|n| is_w(n, "pStyle"))
        .and_then(|n| w_val(&n))?
        .to_ascii_lowercase();
    if style == "title" {
        return Some(1);
    }
    let level: u8 = style.strip_prefix("heading")?.trim().parse().ok()?;
    Some(level.clamp(1, 3))
}

fn collect_segments(paragraph: Node<'_, '_>) -> Vec<Segment> {
    let mut segments = Vec::new();
    for run in paragraph.descendants().filter(|n| is_w(n, "r")) {
        let format = run_format(run);
        for child in run.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "t" => {
                    if let Some(text) = child.text() {
                        segments.push(Segment::Text(format, text.to_string()));
                    }
                }
                "tab" => segments.push(Segment::Text(format, " ".to_string())),
                "br" | "cr" => segments.push(Segment::Break),
                _ => {}
            }
        }
    }
    segments
}

fn merge_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let (Some(Segment::Text(last_format, last)), Segment::Text(format, text)) =
            (merged.last_mut(), &segment)
        {
            if last_format == format {
                last.push_str(text);
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

fn run_format(run: Node<'_, '_>) -> RunFormat {
    let Some(props) = run.children().find(|n| is_w(n, "rPr")) else {
        return RunFormat::default();
    };
    let toggle = |name: &str| {
        props
            .children()
            .find(|n| is_w(n, name))
            .map(|n| !matches!(w_val(&n), Some("false" | "0" | "off" | "none")))
            .unwrap_or(false)
    };
    RunFormat {
        bold: toggle("b"),
        italic: toggle("i"),
        underline: toggle("u"),
    }
}

/// `{name}` -> `{{name}}`, leaving tokens that are already doubled alone.
fn rewrite_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut last = 0;
    for m in TOKEN.find_iter(text) {
        let doubled = text[..m.start()].ends_with('{') || text[m.end()..].starts_with('}');
        out.push_str(&text[last..m.start()]);
        if doubled {
            out.push_str(m.as_str());
        } else {
            out.push('{');
            out.push_str(m.as_str());
            out.push('}');
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

fn is_w(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn w_val<'a>(node: &Node<'a, '_>) -> Option<&'a str> {
    node.attribute((W_NS, "val")).or_else(|| node.attribute("val"))
}
