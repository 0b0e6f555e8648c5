//! Records produced and persisted by the extraction pipeline.
//!
//! Every type here is a JSON line in one of the two logs:
//!
//! * the **text log** holds [`PageRecord`]s, one per processed page;
//! * the **table log** holds [`TableRecord`]s, the final merged sequence.
//!
//! Field names follow the on-disk format, so records written by earlier runs
//! of the pipeline load unchanged.

use crate::error::{Stage, StageError};
use serde::{Deserialize, Serialize};

/// `"success"` or `"failed"`, stamped on every persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Success,
    Failed,
}

impl ExtractionStatus {
    pub fn is_success(self) -> bool {
        self == ExtractionStatus::Success
    }
}

// ── Page structure ───────────────────────────────────────────────────────

/// Classification of one content block on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionType {
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "list")]
    List,
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "TOC")]
    Toc,
    #[serde(rename = "footnote")]
    Footnote,
    #[serde(rename = "caption")]
    Caption,
}

/// Vertical location of a block on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Middle,
    Bottom,
}

/// One logical block of a structured page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: SectionType,
    /// For tables: the complete markdown table, separator row included.
    pub content: String,
    pub position: Position,
}

/// A page after OCR and structuring, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPage {
    pub page_number: u32,
    pub has_tables: bool,
    pub table_count: u32,
    /// Whole-page markdown; tables are wrapped in `[TABLE START]` / `[TABLE END]`.
    pub formatted_text: String,
    pub sections: Vec<Section>,
}

impl StructuredPage {
    /// Markdown of every `table` section, in reading order.
    pub fn table_blocks(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .filter(|s| s.kind == SectionType::Table)
            .map(|s| s.content.as_str())
    }
}

/// `text_data` of a page whose OCR or structuring failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub error: String,
    pub details: String,
    pub page_number: u32,
}

impl PageFailure {
    pub fn from_stage_error(page: u32, err: &StageError) -> Self {
        Self {
            error: err.stage().failure_label().to_string(),
            details: err.to_string(),
            page_number: page,
        }
    }
}

/// Payload of a text-log line: a structured page, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageText {
    Structured(StructuredPage),
    Failed(PageFailure),
}

/// One line of the text log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page: u32,
    pub text_data: PageText,
    pub extraction_status: ExtractionStatus,
}

impl PageRecord {
    pub fn success(page: StructuredPage) -> Self {
        Self {
            page: page.page_number,
            text_data: PageText::Structured(page),
            extraction_status: ExtractionStatus::Success,
        }
    }

    pub fn failed(page: u32, err: &StageError) -> Self {
        Self {
            page,
            text_data: PageText::Failed(PageFailure::from_stage_error(page, err)),
            extraction_status: ExtractionStatus::Failed,
        }
    }

    /// The structured page, if this record can be served from the cache.
    pub fn cached_page(&self) -> Option<&StructuredPage> {
        match (&self.text_data, self.extraction_status) {
            (PageText::Structured(p), ExtractionStatus::Success) => Some(p),
            _ => None,
        }
    }
}

// ── Tables ───────────────────────────────────────────────────────────────

/// Structural metadata of one table. Never carries cell values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSkeleton {
    #[serde(default)]
    pub caption: Option<String>,
    pub column_count: u32,
    /// Data rows only; header rows are excluded.
    pub row_count: u32,
    pub column_headers: Vec<String>,
    pub row_headers: Vec<String>,
    /// Pre-merge `table_index` values of the two records fused into this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<[u32; 2]>,
}

/// `meta` of a table record whose skeleton could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMeta {
    pub error: String,
    pub details: String,
}

impl From<&StageError> for ErrorMeta {
    fn from(err: &StageError) -> Self {
        Self {
            error: Stage::Skeleton.failure_label().to_string(),
            details: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableMeta {
    Skeleton(TableSkeleton),
    Error(ErrorMeta),
}

/// One line of the table log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    /// 1-based, contiguous across the whole document.
    pub table_index: u32,
    pub page: u32,
    pub meta: TableMeta,
    pub extraction_status: ExtractionStatus,
}

impl TableRecord {
    pub fn from_result(
        table_index: u32,
        page: u32,
        result: Result<TableSkeleton, StageError>,
    ) -> Self {
        match result {
            Ok(skeleton) => Self {
                table_index,
                page,
                meta: TableMeta::Skeleton(skeleton),
                extraction_status: ExtractionStatus::Success,
            },
            Err(e) => Self {
                table_index,
                page,
                meta: TableMeta::Error(ErrorMeta::from(&e)),
                extraction_status: ExtractionStatus::Failed,
            },
        }
    }

    pub fn skeleton(&self) -> Option<&TableSkeleton> {
        match &self.meta {
            TableMeta::Skeleton(s) if self.extraction_status.is_success() => Some(s),
            _ => None,
        }
    }
}

// ── Run summary ──────────────────────────────────────────────────────────

/// Where a target page ended up in the per-page state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    /// Served from the text-log cache; OCR and structuring were skipped.
    Cached,
    /// Freshly rendered, OCR'd and structured.
    OcrOk,
    /// Render, OCR or structuring failed; no table analysis.
    OcrFailed,
    /// Page number outside the document.
    Skipped,
}

/// Final state of one target page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOutcome {
    pub page: u32,
    pub state: PageState,
    /// Table blocks sent to the skeleton stage from this page.
    pub table_count: usize,
}

/// Aggregated statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Page count of the PDF.
    pub total_pages: usize,
    /// Pages in the target list.
    pub target_pages: usize,
    pub cached_pages: usize,
    pub processed_pages: usize,
    pub failed_pages: usize,
    pub skipped_pages: usize,
    pub tables_analyzed: usize,
    pub tables_failed: usize,
    /// Pairwise merges performed by the merge pass.
    pub merges: usize,
    pub total_duration_ms: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Final merged table records, `table_index` = 1..=N.
    pub tables: Vec<TableRecord>,
    /// Text-log records appended by this run (cached pages excluded).
    pub page_records: Vec<PageRecord>,
    pub pages: Vec<PageOutcome>,
    pub stats: ExtractionStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_record_reads_logged_line() {
        let line = json!({
            "page": 3,
            "text_data": {
                "page_number": 3,
                "has_tables": true,
                "table_count": 1,
                "formatted_text": "## Revenue\n[TABLE START]\n| Year | Revenue |\n|---|---|\n| 2024 | 10 |\n[TABLE END]",
                "sections": [
                    {"type": "header", "content": "Revenue", "position": "top"},
                    {"type": "table", "content": "| Year | Revenue |\n|---|---|\n| 2024 | 10 |", "position": "middle"},
                    {"type": "TOC", "content": "1 ..... 2", "position": "bottom"}
                ]
            },
            "extraction_status": "success"
        });

        let rec: PageRecord = serde_json::from_value(line).expect("valid record");
        let page = rec.cached_page().expect("structured success");
        assert_eq!(page.sections[2].kind, SectionType::Toc);
        assert_eq!(page.table_blocks().count(), 1);
    }

    #[test]
    fn failed_page_record_round_trips_as_failure() {
        let err = StageError::Transport {
            stage: Stage::Ocr,
            detail: "HTTP 503".into(),
        };
        let rec = PageRecord::failed(5, &err);
        let text = serde_json::to_string(&rec).unwrap();
        assert!(text.contains("\"error\":\"Raw OCR failed\""));
        assert!(text.contains("\"extraction_status\":\"failed\""));

        let back: PageRecord = serde_json::from_str(&text).unwrap();
        assert!(matches!(back.text_data, PageText::Failed(_)));
        assert!(back.cached_page().is_none());
    }

    #[test]
    fn unknown_section_type_is_rejected() {
        let section = json!({"type": "figure", "content": "x", "position": "top"});
        assert!(serde_json::from_value::<Section>(section).is_err());
    }

    #[test]
    fn merged_from_only_serialised_when_present() {
        let mut skeleton = TableSkeleton {
            caption: None,
            column_count: 2,
            row_count: 2,
            column_headers: vec!["Year".into(), "Revenue".into()],
            row_headers: vec!["2023".into(), "2024".into()],
            merged_from: None,
        };
        let plain = serde_json::to_value(&skeleton).unwrap();
        assert!(plain.get("merged_from").is_none());
        assert_eq!(plain["caption"], serde_json::Value::Null);

        skeleton.merged_from = Some([1, 2]);
        let merged = serde_json::to_value(&skeleton).unwrap();
        assert_eq!(merged["merged_from"], json!([1, 2]));
    }

    #[test]
    fn failed_table_meta_deserialises_as_error() {
        let rec = json!({
            "table_index": 4,
            "page": 7,
            "meta": {"error": "Failed to analyze table", "details": "timeout"},
            "extraction_status": "failed"
        });
        let rec: TableRecord = serde_json::from_value(rec).unwrap();
        assert!(matches!(rec.meta, TableMeta::Error(_)));
        assert!(rec.skeleton().is_none());
    }
}
