// Document Extractor
// Turns uploaded file bytes into plain text for the analysis pipeline.
// Supported formats: txt, pdf (pdf-extract), docx (docx-rs, with a raw
// document.xml fallback for files docx-rs rejects).

use std::io::Read;

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse document: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Txt,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolve a format from a file name extension. Unknown extensions are a
    /// fatal error for the run, reported by the caller.
    pub fn from_name(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" | "md" => Some(Self::Txt),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Extract plain text from document bytes in the declared format.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    let text = match format {
        DocumentFormat::Txt => String::from_utf8_lossy(bytes).into_owned(),
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Parse(format!("pdf: {}", e)))?,
        DocumentFormat::Docx => extract_docx(bytes)?,
    };
    info!(
        "[EXTRACTOR] Extracted {} chars ({} bytes input)",
        text.chars().count(),
        bytes.len()
    );
    Ok(text)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    match docx_rs::read_docx(bytes) {
        Ok(docx) => {
            let mut out = String::new();
            for child in &docx.document.children {
                if let DocumentChild::Paragraph(para) = child {
                    let mut line = String::new();
                    for pc in &para.children {
                        if let ParagraphChild::Run(run) = pc {
                            for rc in &run.children {
                                if let RunChild::Text(t) = rc {
                                    line.push_str(&t.text);
                                }
                            }
                        }
                    }
                    if !line.trim().is_empty() {
                        out.push_str(line.trim());
                        out.push('\n');
                    }
                }
            }
            Ok(out)
        }
        Err(e) => {
            warn!("[EXTRACTOR] docx-rs parse failed, trying raw XML: {}", e);
            extract_docx_raw(bytes)
        }
    }
}

/// Fallback: unzip word/document.xml and strip the markup.
fn extract_docx_raw(bytes: &[u8]) -> Result<String, ExtractError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive =
        zip::ZipArchive::new(cursor).map_err(|e| ExtractError::Parse(format!("docx zip: {}", e)))?;
    let mut file = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Parse(format!("docx document.xml: {}", e)))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| ExtractError::Parse(format!("docx read: {}", e)))?;

    // Paragraph ends become newlines before tags are stripped.
    let xml = xml.replace("</w:p>", "</w:p>\n");
    let tag_re = Regex::new(r"<[^>]+>").unwrap();
    let stripped = tag_re.replace_all(&xml, "");
    Ok(decode_entities(&stripped))
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name() {
        assert_eq!(DocumentFormat::from_name("essay.txt"), Some(DocumentFormat::Txt));
        assert_eq!(DocumentFormat::from_name("Thesis.PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_name("paper.docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_name("archive.odt"), None);
        assert_eq!(DocumentFormat::from_name("noextension"), None);
    }

    #[test]
    fn test_extract_txt_lossy() {
        let text = extract_text(b"plain text body", DocumentFormat::Txt).unwrap();
        assert_eq!(text, "plain text body");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[test]
    fn test_extract_docx_raw_from_minimal_archive() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("word/document.xml", SimpleFileOptions::default())
                .unwrap();
            writer
                .write_all(
                    b"<w:document><w:body><w:p><w:r><w:t>First line.</w:t></w:r></w:p>\
                      <w:p><w:r><w:t>Second &amp; last.</w:t></w:r></w:p></w:body></w:document>",
                )
                .unwrap();
            writer.finish().unwrap();
        }
        let bytes = buf.into_inner();
        let text = extract_docx_raw(&bytes).unwrap();
        assert!(text.contains("First line."));
        assert!(text.contains("Second & last."));
    }
}
