//! Pipeline stages for table-skeleton extraction.
//!
//! Each submodule implements exactly one transformation step, and each
//! model-backed step sits behind a trait so the orchestrator can be driven
//! with fakes in tests or with a model-free skeleton engine offline.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ ocr ──▶ structure ──▶ skeleton ──▶ merge
//! (pdfium)   (VLM)   (tool call)   (tool call)  (same page + headers)
//! ```
//!
//! 1. [`render`]: rasterise one page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`ocr`]: plain-text transcription of the page image
//! 3. [`structure`]: typed sections; each `table` section is one markdown table
//! 4. [`skeleton`]: headers and counts of one table, never its cells
//! 5. [`merge`]: fuse split tables, renumber `1..=N`
//!
//! [`encode`], [`llm`] and [`markdown`] are shared helpers.

pub mod encode;
pub mod llm;
pub mod markdown;
pub mod merge;
pub mod ocr;
pub mod render;
pub mod skeleton;
pub mod structure;
