//! Plain-text extraction for uploaded rulebook PDFs.
//!
//! Malformed input becomes a [`QaError::Extraction`] and the upload is
//! abandoned with a warning. `pdf-extract` panics on some structurally
//! valid but inconsistent documents (missing fonts, text shown before a
//! font is selected); those panics are caught here and reported the same
//! way.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{QaError, Result};

/// Extracts the text of every page, in page order.
///
/// A document that parses but yields only whitespace is reported as an
/// extraction failure, since there is nothing to index.
pub fn extract_pdf_text(file_name: &str, bytes: &[u8]) -> Result<String> {
    let extraction_error = |reason: String| QaError::Extraction {
        file: file_name.to_string(),
        reason,
    };

    let text = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }))
    .map_err(|_| extraction_error("malformed PDF".to_string()))?
    .map_err(|e| extraction_error(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(extraction_error(
            "the document contains no extractable text".to_string(),
        ));
    }

    Ok(text)
}

/// Runs [`extract_pdf_text`] on the blocking pool so large documents do not
/// stall the async workers.
pub async fn extract_pdf_text_blocking(file_name: &str, bytes: &[u8]) -> Result<String> {
    let name = file_name.to_string();
    let owned = bytes.to_vec();
    tokio::task::spawn_blocking(move || extract_pdf_text(&name, &owned))
        .await
        .map_err(|e| QaError::Extraction {
            file: file_name.to_string(),
            reason: if e.is_panic() {
                "malformed PDF".to_string()
            } else {
                e.to_string()
            },
        })?
}
