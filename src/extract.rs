use std::io::{Cursor, Read};

use anyhow::Context;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Upper bound on résumé text forwarded to the model.
pub const MAX_EXTRACTED_CHARS: usize = 20_000;

/// Ceiling on the decompressed size of `word/document.xml`.
const DOCX_XML_MAX: u64 = 4 * 1024 * 1024;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeKind {
    Pdf,
    Docx,
}

impl ResumeKind {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        match content_type {
            PDF_MIME => Some(ResumeKind::Pdf),
            DOCX_MIME => Some(ResumeKind::Docx),
            _ => None,
        }
    }
}

/// Turns an uploaded document into raw text. Runs on the blocking pool.
pub trait ResumeExtractor: Send + Sync {
    fn extract(&self, kind: ResumeKind, bytes: &[u8]) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl ResumeExtractor for DocumentExtractor {
    fn extract(&self, kind: ResumeKind, bytes: &[u8]) -> anyhow::Result<String> {
        match kind {
            ResumeKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| anyhow::anyhow!("read pdf text: {e}")),
            ResumeKind::Docx => docx_text(bytes),
        }
    }
}

/// Paragraph text of `word/document.xml`, one line per `<w:p>`.
fn docx_text(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("open docx archive")?;
    let part = archive
        .by_name("word/document.xml")
        .context("docx has no word/document.xml")?;
    if part.size() > DOCX_XML_MAX {
        anyhow::bail!("word/document.xml inflates to {} bytes", part.size());
    }

    // The declared size can lie; cap what is actually inflated too.
    let mut xml = String::new();
    part.take(DOCX_XML_MAX + 1)
        .read_to_string(&mut xml)
        .context("read word/document.xml")?;
    if xml.len() as u64 > DOCX_XML_MAX {
        anyhow::bail!("word/document.xml is larger than {DOCX_XML_MAX} bytes");
    }

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event().context("parse word/document.xml")? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Drops NULs, collapses whitespace runs and caps the length.
pub fn normalize_text(raw: &str) -> String {
    let joined = raw
        .replace('\0', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    joined.chars().take(MAX_EXTRACTED_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with(body_xml: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        let doc = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}</w:body></w:document>"#
        );
        zip.write_all(doc.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn mime_mapping_is_exact() {
        assert_eq!(ResumeKind::from_mime(PDF_MIME), Some(ResumeKind::Pdf));
        assert_eq!(ResumeKind::from_mime(DOCX_MIME), Some(ResumeKind::Docx));
        assert_eq!(ResumeKind::from_mime("application/msword"), None);
        assert_eq!(ResumeKind::from_mime("text/plain"), None);
        assert_eq!(ResumeKind::from_mime("application/PDF"), None);
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = docx_with(
            "<w:p><w:r><w:t>Senior</w:t></w:r><w:r><w:t xml:space=\"preserve\"> Engineer</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Rust &amp; Go</w:t></w:r></w:p>",
        );
        let text = DocumentExtractor.extract(ResumeKind::Docx, &bytes).unwrap();
        assert_eq!(text, "Senior Engineer\nRust & Go\n");
    }

    #[test]
    fn highly_compressible_docx_is_refused() {
        let filler = "a".repeat(5 * 1024 * 1024);
        let bytes = docx_with(&format!("<w:p><w:r><w:t>{filler}</w:t></w:r></w:p>"));
        assert!(bytes.len() < 1024 * 1024, "archive is {} bytes", bytes.len());

        let err = DocumentExtractor
            .extract(ResumeKind::Docx, &bytes)
            .unwrap_err();
        assert!(err.to_string().contains("word/document.xml"), "{err}");
    }

    #[test]
    fn docx_without_document_part_fails() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(DocumentExtractor.extract(ResumeKind::Docx, &bytes).is_err());
    }

    #[test]
    fn garbage_is_not_a_docx() {
        assert!(DocumentExtractor
            .extract(ResumeKind::Docx, b"definitely not a zip")
            .is_err());
    }

    #[test]
    fn normalize_collapses_and_strips() {
        assert_eq!(normalize_text("  a\0b \n\n c\t d  "), "a b c d");
    }

    #[test]
    fn normalize_caps_length_on_char_boundary() {
        let long = "é".repeat(MAX_EXTRACTED_CHARS + 10);
        let out = normalize_text(&long);
        assert_eq!(out.chars().count(), MAX_EXTRACTED_CHARS);
    }
}
