//! # pdf-table-skeleton
//!
//! Recover the structure of tables in financial-report PDFs: caption, column
//! headers, row headers and counts. Cell values are never extracted.
//!
//! ## Why this crate?
//!
//! Reports split into short PDF parts still carry dense, irregular tables:
//! multi-level headers, sparse first columns, one table broken into two
//! blocks by the layout. Text extraction flattens all of that. This crate
//! renders each target page, has a vision model transcribe it, has a second
//! model segment the transcription into typed sections with every table as
//! one markdown block, then reads each block's skeleton under a fixed schema.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + target pages
//!  │
//!  ├─ 1. Cache     pages already in the text log skip steps 2–4
//!  ├─ 2. Render    rasterise via pdfium (spawn_blocking)
//!  ├─ 3. OCR       vision model → plain text
//!  ├─ 4. Structure tool call → sections, tables as markdown
//!  ├─ 5. Skeleton  tool call (or markdown reader) per table block
//!  ├─ 6. Merge     fuse same-page, same-header neighbours
//!  └─ 7. Persist   append new pages to the text log, rewrite the table log
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_table_skeleton::{extract, ExtractionConfig, TargetPages};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::builder()
//!         .pdf_path("raws_split/report_part02.pdf")
//!         .pages(TargetPages::new([1, 3]))
//!         .build()?;
//!     let output = extract(&config).await?;
//!     for table in &output.tables {
//!         println!("#{} page {}: {:?}", table.table_index, table.page, table.skeleton());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `table-skeleton` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-table-skeleton = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, SkeletonBackend, TargetPages};
pub use extract::{default_collaborators, extract, extract_sync, Collaborators, TableExtractor};
pub use error::{Stage, StageError, TableExtractError};
pub use output::{
    ExtractionOutput, ExtractionStats, ExtractionStatus, PageOutcome, PageRecord, PageState,
    StructuredPage, TableMeta, TableRecord, TableSkeleton,
};
pub use pipeline::merge::{merge_consecutive_tables, MergeOutcome};
pub use pipeline::ocr::OcrEngine;
pub use pipeline::render::PageRenderer;
pub use pipeline::skeleton::{MarkdownSkeletonEngine, SkeletonEngine};
pub use pipeline::structure::PageStructurer;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{read_table_log, write_table_log, JsonlPageStore, PageCache, PageStore};
