//! Top-level extraction entry points.
//!
//! [`TableExtractor`] walks the target pages through a small per-page state
//! machine:
//!
//! ```text
//!         ┌── in text log ──────────────▶ Cached ──┐
//! page ───┤                                        ├──▶ table blocks ──▶ skeletons
//!         └── render ─▶ ocr ─▶ structure ▶ OcrOk ──┘
//!                    └─ any failure ─────▶ OcrFailed   (no table analysis)
//! ```
//!
//! Out-of-range pages go straight to `Skipped`; a list with no page inside
//! the document still runs and writes an empty table log. Every table block of every
//! structured page gets a document-wide `table_index`; failed blocks keep
//! their slot. Once all pages are done the records are merged, the new page
//! records are appended to the text log, and the table log is replaced.
//!
//! Pages and tables are handled strictly one at a time, in list order.

use crate::config::{ExtractionConfig, SkeletonBackend, TargetPages};
use crate::error::{StageError, TableExtractError};
use crate::output::{
    ExtractionOutput, ExtractionStats, PageOutcome, PageRecord, PageState, StructuredPage,
    TableRecord,
};
use crate::pipeline::llm::resolve_provider;
use crate::pipeline::markdown::truncate_table;
use crate::pipeline::merge::merge_consecutive_tables;
use crate::pipeline::ocr::{LlmOcrEngine, OcrEngine};
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::pipeline::skeleton::{LlmSkeletonEngine, MarkdownSkeletonEngine, SkeletonEngine};
use crate::pipeline::structure::{LlmPageStructurer, PageStructurer};
use crate::store::{self, JsonlPageStore, PageStore};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The four stage implementations a run depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub renderer: Arc<dyn PageRenderer>,
    pub ocr: Arc<dyn OcrEngine>,
    pub structurer: Arc<dyn PageStructurer>,
    pub skeleton: Arc<dyn SkeletonEngine>,
}

/// Orchestrates one document over injected stages and storage.
pub struct TableExtractor {
    collaborators: Collaborators,
    store: Box<dyn PageStore>,
    config: ExtractionConfig,
}

impl TableExtractor {
    pub fn new(
        collaborators: Collaborators,
        store: Box<dyn PageStore>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            collaborators,
            store,
            config,
        }
    }

    /// Process `pages`, persist both logs and return what was produced.
    ///
    /// Only storage failures and an unreadable document are fatal. Skipped
    /// pages and per-page or per-table failures are recorded in-band.
    pub async fn run(&self, pages: &TargetPages) -> Result<ExtractionOutput, TableExtractError> {
        let start = Instant::now();
        let cb = self.config.progress_callback.as_ref();

        let cache = self.store.load()?;
        let total_pages = self.collaborators.renderer.page_count().await?;
        let in_range = |p: u32| p >= 1 && (p as usize) <= total_pages;

        let target_count = pages.len();
        if let Some(cb) = cb {
            cb.on_run_start(target_count);
        }

        let mut stats = ExtractionStats {
            total_pages,
            target_pages: target_count,
            ..Default::default()
        };
        let mut outcomes = Vec::with_capacity(target_count);
        let mut new_records: Vec<PageRecord> = Vec::new();
        let mut tables: Vec<TableRecord> = Vec::new();
        let mut next_index: u32 = 1;

        for &page in pages.as_slice() {
            if !in_range(page) {
                warn!(
                    "Page {} is outside the document ({} pages), skipping",
                    page, total_pages
                );
                if let Some(cb) = cb {
                    cb.on_page_error(page, target_count, "page out of range");
                }
                stats.skipped_pages += 1;
                outcomes.push(PageOutcome {
                    page,
                    state: PageState::Skipped,
                    table_count: 0,
                });
                continue;
            }

            if let Some(cb) = cb {
                cb.on_page_start(page, target_count);
            }

            let (structured, state) = match cache.get(page) {
                Some(cached) => {
                    debug!("Page {}: served from text log", page);
                    if let Some(cb) = cb {
                        cb.on_page_cached(page, target_count);
                    }
                    stats.cached_pages += 1;
                    (Cow::Borrowed(cached), PageState::Cached)
                }
                None => match self.structure_page(page).await {
                    Ok(fresh) => {
                        new_records.push(PageRecord::success(fresh.clone()));
                        stats.processed_pages += 1;
                        (Cow::Owned(fresh), PageState::OcrOk)
                    }
                    Err(e) => {
                        warn!("Page {}: {}", page, e);
                        if let Some(cb) = cb {
                            cb.on_page_error(page, target_count, &e.to_string());
                        }
                        new_records.push(PageRecord::failed(page, &e));
                        stats.failed_pages += 1;
                        outcomes.push(PageOutcome {
                            page,
                            state: PageState::OcrFailed,
                            table_count: 0,
                        });
                        continue;
                    }
                },
            };

            let mut page_tables = 0;
            for block in structured.table_blocks() {
                let table_index = next_index;
                next_index += 1;
                page_tables += 1;

                let record = self.analyze_table(page, table_index, block).await;
                let ok = record.extraction_status.is_success();
                if !ok {
                    stats.tables_failed += 1;
                }
                if let Some(cb) = cb {
                    cb.on_table_analyzed(page, table_index, ok);
                }
                tables.push(record);
            }
            stats.tables_analyzed += page_tables;

            info!("Page {}: {} table blocks", page, page_tables);
            if let Some(cb) = cb {
                cb.on_page_complete(page, target_count, page_tables);
            }
            outcomes.push(PageOutcome {
                page,
                state,
                table_count: page_tables,
            });
        }

        let merged = merge_consecutive_tables(tables);
        stats.merges = merged.merges;
        if merged.merges > 0 {
            info!("Merged {} split tables", merged.merges);
        }

        self.store.append(&new_records)?;
        store::write_table_log(&self.config.table_log, &merged.records)?;

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extraction complete: {} tables from {} pages ({} cached, {} failed) in {}ms",
            merged.records.len(),
            target_count,
            stats.cached_pages,
            stats.failed_pages,
            stats.total_duration_ms
        );
        if let Some(cb) = cb {
            cb.on_run_complete(target_count, merged.records.len());
        }

        Ok(ExtractionOutput {
            tables: merged.records,
            page_records: new_records,
            pages: outcomes,
            stats,
        })
    }

    /// Render, OCR and structure one page.
    async fn structure_page(&self, page: u32) -> Result<StructuredPage, StageError> {
        let c = &self.collaborators;
        let png = c.renderer.render(page, self.config.dpi).await?;
        let text = c.ocr.extract_text(page, &png).await?;
        debug!("Page {}: {} chars of raw text", page, text.len());
        c.structurer.structure(&text, page).await
    }

    async fn analyze_table(&self, page: u32, table_index: u32, block: &str) -> TableRecord {
        let input = truncate_table(block, self.config.skeleton_char_budget);
        if let Cow::Owned(ref cut) = input {
            debug!(
                "Table {} on page {}: truncated {} → {} chars",
                table_index,
                page,
                block.chars().count(),
                cut.chars().count()
            );
        }

        let result = self.collaborators.skeleton.extract_skeleton(&input).await;
        if let Err(ref e) = result {
            warn!("Table {} on page {}: {}", table_index, page, e);
        }
        TableRecord::from_result(table_index, page, result)
    }
}

/// Build the production collaborators for `config`.
///
/// Providers are resolved per stage so each stage can use its own model.
pub fn default_collaborators(config: &ExtractionConfig) -> Result<Collaborators, TableExtractError> {
    let renderer = PdfiumRenderer::open(config)?;

    let ocr_provider = resolve_provider(config, &config.ocr_model)?;
    let structure_provider = resolve_provider(config, &config.structure_model)?;

    let skeleton: Arc<dyn SkeletonEngine> = match config.skeleton_backend {
        SkeletonBackend::Llm => Arc::new(LlmSkeletonEngine::new(
            resolve_provider(config, &config.skeleton_model)?,
            config.temperature,
            config.skeleton_max_tokens,
        )),
        SkeletonBackend::Markdown => Arc::new(MarkdownSkeletonEngine),
    };

    info!(
        "Using models ocr={} structure={} skeleton={:?}",
        config.ocr_model,
        config.structure_model,
        config.skeleton_backend
    );

    Ok(Collaborators {
        renderer: Arc::new(renderer),
        ocr: Arc::new(LlmOcrEngine::new(
            ocr_provider,
            config.temperature,
            config.ocr_max_tokens,
        )),
        structurer: Arc::new(LlmPageStructurer::new(
            structure_provider,
            config.temperature,
            config.structure_max_tokens,
        )),
        skeleton,
    })
}

/// Extract table skeletons from `config.pdf_path` for `config.pages`.
///
/// Uses pdfium for rendering, the configured LLM provider for the model
/// stages and `config.text_log` as the page cache. The merged table records
/// are written to `config.table_log` and also returned.
///
/// # Errors
/// Returns `Err` only for fatal conditions: an unreadable or invalid PDF,
/// pdfium or provider not available, or a log that cannot be read or
/// written.
pub async fn extract(config: &ExtractionConfig) -> Result<ExtractionOutput, TableExtractError> {
    info!(
        "Extracting tables from {} (pages {:?})",
        config.pdf_path.display(),
        config.pages.as_slice()
    );
    let collaborators = default_collaborators(config)?;
    let store = JsonlPageStore::new(&config.text_log);
    TableExtractor::new(collaborators, Box::new(store), config.clone())
        .run(&config.pages)
        .await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(config: &ExtractionConfig) -> Result<ExtractionOutput, TableExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TableExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(config))
}
