//! Error types for the pdf-table-skeleton library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TableExtractError`]: **Fatal**: the run cannot proceed or its results
//!   cannot be persisted (missing PDF, pdfium unavailable, provider not
//!   configured, I/O failure on the text or table log). Returned as
//!   `Err(TableExtractError)` from [`crate::extract::extract`] and
//!   [`crate::extract::TableExtractor::run`].
//!
//! * [`StageError`]: **Non-fatal**: one page or one table failed inside a
//!   pipeline stage (render glitch, transport error, model output that does
//!   not match the schema). It is converted into an in-band
//!   `extraction_status: "failed"` record so the rest of the document is
//!   still processed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-table-skeleton library.
#[derive(Debug, Error)]
pub enum TableExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set --pdfium-lib (or TABLE_SKELETON_PDFIUM_LIB) to the directory holding libpdfium,\n\
or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Persisted state ───────────────────────────────────────────────────
    /// The page text log exists but could not be read.
    #[error("Failed to read page text log '{path}': {source}")]
    TextLogReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// New page records could not be appended to the text log.
    #[error("Failed to append to page text log '{path}': {source}")]
    TextLogWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table log could not be read back.
    #[error("Failed to read table log '{path}': {source}")]
    TableLogReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table log could not be rewritten.
    #[error("Failed to write table log '{path}': {source}")]
    TableLogWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The pipeline stage a [`StageError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Render,
    Ocr,
    Structure,
    Skeleton,
}

impl Stage {
    /// Label written to the `error` field of an in-band failure record.
    pub fn failure_label(self) -> &'static str {
        match self {
            Stage::Render => "Render failed",
            Stage::Ocr => "Raw OCR failed",
            Stage::Structure => "Text structuring failed",
            Stage::Skeleton => "Failed to analyze table",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Render => "render",
            Stage::Ocr => "ocr",
            Stage::Structure => "structure",
            Stage::Skeleton => "skeleton",
        };
        f.write_str(name)
    }
}

/// A non-fatal error for a single page or table.
///
/// Transport failures and schema violations are handled identically by the
/// orchestrator: both become an `extraction_status: "failed"` record.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum StageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// The model call itself failed (network, HTTP status, provider error).
    #[error("{stage} call failed: {detail}")]
    Transport { stage: Stage, detail: String },

    /// The model answered, but not with the required shape.
    #[error("{stage} output violated the schema: {detail}")]
    SchemaViolation { stage: Stage, detail: String },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::RenderFailed { .. } => Stage::Render,
            StageError::Transport { stage, .. } | StageError::SchemaViolation { stage, .. } => {
                *stage
            }
        }
    }
}
