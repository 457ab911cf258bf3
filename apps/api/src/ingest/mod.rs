//! CV upload: turns an uploaded file into plain text for the CV input.
//! PDFs go through pdf-extract; anything else must be UTF-8 text.

use axum::extract::Multipart;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;

const PDF_MAGIC: &[u8] = b"%PDF-";
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct ExtractedCv {
    pub file_name: String,
    pub cv_text: String,
}

/// POST /api/v1/cv/extract
///
/// Multipart upload with a `file` field. Returns the extracted text; the
/// workspace is not touched, the client decides what to do with it.
pub async fn handle_extract_cv(mut multipart: Multipart) -> Result<Json<ExtractedCv>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart data: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("cv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file bytes: {e}")))?;

        let cv_text = if is_pdf(&data) {
            let bytes = data.to_vec();
            tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                .await
                .map_err(|e| {
                    warn!("PDF extraction task failed: {e}");
                    AppError::UnprocessableEntity("Could not read text from the PDF".to_string())
                })??
        } else {
            decode_text(&data)?
        };

        info!(file_name = %file_name, chars = cv_text.len(), "Extracted CV text");
        return Ok(Json(ExtractedCv { file_name, cv_text }));
    }

    Err(AppError::Validation(format!(
        "Multipart form must include a '{FILE_FIELD}' field"
    )))
}

pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(PDF_MAGIC)
}

fn extract_pdf_text(data: &[u8]) -> Result<String, AppError> {
    let text = pdf_extract::extract_text_from_mem(data).map_err(|e| {
        warn!("pdf-extract failed: {e}");
        AppError::UnprocessableEntity("Could not read text from the PDF".to_string())
    })?;
    non_empty(normalize(&text))
}

/// Plain-text uploads. A leading BOM is dropped.
pub fn decode_text(data: &[u8]) -> Result<String, AppError> {
    let text = std::str::from_utf8(data).map_err(|_| {
        AppError::UnprocessableEntity("Uploaded file is neither a PDF nor UTF-8 text".to_string())
    })?;
    non_empty(normalize(text.trim_start_matches('\u{feff}')))
}

/// Collapses the runs of blank lines PDF extraction tends to leave behind.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.replace("\r\n", "\n").lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn non_empty(text: String) -> Result<String, AppError> {
    if text.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "Uploaded file contains no text".to_string(),
        ));
    }
    Ok(text)
}
