//! Plain-text extraction from uploaded documents.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::classifier::DocumentFormat;
use crate::error::ChatError;

/// Extract the text of a document.
///
/// This is CPU-bound; async callers should run it on the blocking pool.
pub fn extract_text(format: DocumentFormat, bytes: &[u8]) -> Result<String, ChatError> {
    let text = match format {
        DocumentFormat::Pdf => pdf_text(bytes)?,
        DocumentFormat::Docx => docx_text(bytes)?,
        DocumentFormat::Txt => String::from_utf8(bytes.to_vec())
            .map_err(|e| ChatError::Document(format!("text file is not valid UTF-8: {}", e)))?,
    };

    if text.trim().is_empty() {
        return Err(ChatError::Document(
            "no text could be extracted from the document".to_string(),
        ));
    }
    Ok(text)
}

fn pdf_text(bytes: &[u8]) -> Result<String, ChatError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ChatError::Document(format!("failed to read PDF: {}", e)))
}

/// Paragraph texts of `word/document.xml`, joined with newlines.
fn docx_text(bytes: &[u8]) -> Result<String, ChatError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ChatError::Document(format!("failed to open DOCX archive: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ChatError::Document(format!("DOCX has no document body: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| ChatError::Document(format!("failed to read DOCX body: {}", e)))?;

    paragraphs(&xml).map(|p| p.join("\n"))
}

fn paragraphs(xml: &str) -> Result<Vec<String>, ChatError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ChatError::Document(format!("malformed DOCX body: {}", e)))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) if in_text => {
                let entity = format!("&{};", String::from_utf8_lossy(&r));
                match quick_xml::escape::unescape(&entity) {
                    Ok(resolved) => current.push_str(&resolved),
                    Err(_) => current.push_str(&entity),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}
