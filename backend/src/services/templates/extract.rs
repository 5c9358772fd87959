//! # Placeholder Extractor
//!
//! Pulls `{name}` tokens out of an uploaded `.docx`.
//!
//! The main document part (`word/document.xml`) is read as text, every `<...>`
//! span is stripped, whitespace is collapsed and the remainder is scanned for
//! `{identifier}`. Tags are removed without a trace, so a token Word split
//! across formatting runs is joined back together; the price is that words of
//! adjacent paragraphs run into each other in `plain_text`.

use crate::error::AppError;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use zip::ZipArchive;

/// Archive entry holding the document body.
pub const DOCUMENT_PART: &str = "word/document.xml";

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("token regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub placeholders: BTreeSet<String>,
    pub plain_text: String,
}

pub fn extract(bytes: &[u8]) -> Result<Extraction, AppError> {
    let xml = read_part(bytes, DOCUMENT_PART)?;
    let stripped = TAG.replace_all(&xml, "");
    let plain_text = WHITESPACE.replace_all(&stripped, " ").trim().to_string();
    let placeholders = TOKEN
        .captures_iter(&plain_text)
        .map(|caps| caps[1].to_string())
        .collect();
    Ok(Extraction {
        placeholders,
        plain_text,
    })
}

/// Reads one archive entry as UTF-8 text.
pub fn read_part(bytes: &[u8], name: &str) -> Result<String, AppError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::InvalidDocumentFormat(format!("not a .docx archive: {}", e)))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|_| AppError::InvalidDocumentFormat(format!("missing {}", name)))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| AppError::InvalidDocumentFormat(format!("unreadable {}: {}", name, e)))?;
    Ok(xml)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    /// Wraps body XML into a minimal `.docx` archive.
    pub fn docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
            W_NS, body
        );
        archive(&[("[Content_Types].xml", "<Types/>"), ("word/document.xml", xml.as_str())])
    }

    pub fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// One paragraph per string, plain runs.
    pub fn paragraphs(texts: &[&str]) -> Vec<u8> {
        let body: String = texts
            .iter()
            .map(|t| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, t))
            .collect();
        docx(&body)
    }
}
