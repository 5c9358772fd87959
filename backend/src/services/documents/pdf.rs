//! # PDF Rendering Service
//!
//! `GET /api/documents/{document_id}/pdf` renders a generated document as a
//! PDF and serves it inline.
//!
//! The stored HTML is flattened into blocks (paragraphs, headings, list
//! items, table cells), and each block becomes a `genpdf` paragraph whose
//! runs keep their bold/italic styling. Fonts are loaded from the configured
//! fonts directory: the Arial family if present, LiberationSans otherwise.

use super::generate::load_document;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::DOCUMENTS_BUCKET;
use actix_web::{web, HttpResponse};
use common::helpers::unescape_html;
use genpdf::elements::{Break, Paragraph};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::Document;
use log::info;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*>").expect("tag regex"));

const MARGIN_MM: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl TextStyle {
    fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => TextStyle::Regular,
            (true, false) => TextStyle::Bold,
            (false, true) => TextStyle::Italic,
            (true, true) => TextStyle::BoldItalic,
        }
    }

    fn apply(self, style: Style) -> Style {
        match self {
            TextStyle::Regular => style,
            TextStyle::Bold => style.bold(),
            TextStyle::Italic => style.italic(),
            TextStyle::BoldItalic => style.bold().italic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextSegment {
    text: String,
    style: TextStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    Heading(u8),
    ListItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    kind: BlockKind,
    segments: Vec<TextSegment>,
}

pub async fn process(
    state: web::Data<AppState>,
    document_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let db = state.db.clone();
    let objects = state.objects.clone();
    let document_id = document_id.into_inner();
    let (document, bytes) = web::block(move || -> Result<_, AppError> {
        let document = load_document(db.as_ref(), &document_id)?;
        let bytes = objects.fetch(DOCUMENTS_BUCKET, &document.path)?;
        Ok((document, bytes))
    })
    .await??;
    let html = String::from_utf8(bytes)
        .map_err(|e| AppError::Render(format!("stored document is not UTF-8: {}", e)))?;

    let fonts_dir = state.config.fonts_dir.clone();
    let title = format!("Document {}", document.id);
    let pdf = web::block(move || render_pdf(&html, &fonts_dir, &title)).await??;

    info!("Rendered document {} as PDF ({} bytes)", document.id, pdf.len());
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            "Content-Disposition",
            format!("inline; filename=\"{}.pdf\"", document.id),
        ))
        .body(pdf))
}

/// Renders document HTML into PDF bytes.
pub fn render_pdf(html: &str, fonts_dir: &Path, title: &str) -> Result<Vec<u8>, AppError> {
    let mut doc = configure_document(fonts_dir, title)?;
    for block in html_blocks(html) {
        push_block(&mut doc, &block);
    }
    let mut out = Vec::new();
    doc.render(&mut out)
        .map_err(|e| AppError::Render(e.to_string()))?;
    Ok(out)
}

fn load_font(fonts_dir: &Path) -> Result<FontFamily<FontData>, AppError> {
    if let Ok(family) = genpdf::fonts::from_files(fonts_dir, "Arial", None) {
        return Ok(family);
    }
    genpdf::fonts::from_files(fonts_dir, "LiberationSans", None).map_err(|e| {
        AppError::Render(format!("no usable font in {}: {}", fonts_dir.display(), e))
    })
}

fn configure_document(fonts_dir: &Path, title: &str) -> Result<Document, AppError> {
    let mut doc = Document::new(load_font(fonts_dir)?);
    doc.set_title(title);

    // 11px body text at 0.75pt per px.
    let font_size_pt: u8 = (11.0_f32 * 0.75_f32).round() as u8;
    doc.set_font_size(font_size_pt);
    doc.set_line_spacing(1.0f64);

    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(MARGIN_MM);
    doc.set_page_decorator(decorator);
    Ok(doc)
}

fn push_block(doc: &mut Document, block: &Block) {
    let base = match block.kind {
        BlockKind::Heading(1) => Style::new().bold().with_font_size(14),
        BlockKind::Heading(2) => Style::new().bold().with_font_size(12),
        BlockKind::Heading(_) => Style::new().bold().with_font_size(10),
        BlockKind::Paragraph | BlockKind::ListItem => Style::new(),
    };
    let mut paragraph = Paragraph::new("");
    if block.kind == BlockKind::ListItem {
        paragraph.push(StyledString::new("• ", base));
    }
    for segment in &block.segments {
        paragraph.push(StyledString::new(segment.text.clone(), segment.style.apply(base)));
    }
    doc.push(paragraph);
    if matches!(block.kind, BlockKind::Heading(_)) {
        doc.push(Break::new(1));
    }
}

/// Flattens HTML into styled text blocks.
fn html_blocks(html: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    let mut last = 0;
    for caps in TAG.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        builder.text(&html[last..whole.start()]);
        last = whole.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        match name.as_str() {
            "b" | "strong" => builder.bold = step(builder.bold, closing),
            "i" | "em" => builder.italic = step(builder.italic, closing),
            "br" => builder.flush(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                builder.flush();
                builder.kind = if closing {
                    BlockKind::Paragraph
                } else {
                    let level = name[1..].parse::<u8>().unwrap_or(3);
                    BlockKind::Heading(level.min(3))
                };
            }
            "li" => {
                builder.flush();
                builder.kind = if closing {
                    BlockKind::Paragraph
                } else {
                    BlockKind::ListItem
                };
            }
            "p" | "div" | "td" | "th" | "tr" | "table" | "ul" | "ol" => builder.flush(),
            _ => {}
        }
    }
    builder.text(&html[last..]);
    builder.flush();
    builder.blocks
}

fn step(depth: usize, closing: bool) -> usize {
    if closing {
        depth.saturating_sub(1)
    } else {
        depth + 1
    }
}

struct BlockBuilder {
    blocks: Vec<Block>,
    kind: BlockKind,
    segments: Vec<TextSegment>,
    bold: usize,
    italic: usize,
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            kind: BlockKind::Paragraph,
            segments: Vec::new(),
            bold: 0,
            italic: 0,
        }
    }
}

impl BlockBuilder {
    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = unescape_html(raw);
        let mut text = String::with_capacity(decoded.len());
        let mut in_space = false;
        for c in decoded.chars() {
            if c.is_whitespace() {
                if !in_space {
                    text.push(' ');
                }
                in_space = true;
            } else {
                text.push(c);
                in_space = false;
            }
        }

        let style = TextStyle::from_flags(self.bold > 0, self.italic > 0);
        match self.segments.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.segments.push(TextSegment { text, style }),
        }
    }

    fn flush(&mut self) {
        let mut segments = std::mem::take(&mut self.segments);
        if let Some(first) = segments.first_mut() {
            first.text = first.text.trim_start().to_string();
        }
        if let Some(last) = segments.last_mut() {
            last.text = last.text.trim_end().to_string();
        }
        segments.retain(|s| !s.text.is_empty());
        if !segments.is_empty() {
            self.blocks.push(Block {
                kind: self.kind,
                segments,
            });
        }
    }
}
