//! Turning uploaded files into material text.

use studyaid_shared::{ContentKind, Result, StudyAidError};
use tracing::debug;

/// Map an upload's declared MIME type to a supported kind.
pub fn content_kind_for(mime: &str) -> Result<ContentKind> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "application/pdf" => Ok(ContentKind::Pdf),
        "text/plain" => Ok(ContentKind::Text),
        other => Err(StudyAidError::validation(format!(
            "Unsupported file type: {other}. Please upload a PDF or text file."
        ))),
    }
}

/// Text of every page, joined with blank lines.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| StudyAidError::parse(format!("PDF extraction failed: {e}")))?;
    debug!(pages = pages.len(), "extracted PDF text");

    let text = pages
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(text)
}

pub fn decode_text(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| StudyAidError::validation("Text file must be UTF-8 encoded"))
}

/// Extract the material text for an upload of the given kind.
pub fn extract_text(kind: ContentKind, bytes: &[u8]) -> Result<String> {
    match kind {
        ContentKind::Pdf => extract_pdf_text(bytes),
        ContentKind::Text => decode_text(bytes),
    }
}

/// [`extract_text`] on the blocking pool; PDF parsing is CPU-bound.
/// The bytes are handed back so the caller can still store the file.
pub async fn extract_text_blocking(kind: ContentKind, bytes: Vec<u8>) -> Result<(String, Vec<u8>)> {
    tokio::task::spawn_blocking(move || {
        let text = extract_text(kind, &bytes)?;
        Ok((text, bytes))
    })
    .await
    .map_err(|e| StudyAidError::parse(format!("extraction task: {e}")))?
}
