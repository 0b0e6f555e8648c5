//! Configuration types for table-skeleton extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Paths, target pages, model names and stage
//! limits live in one struct so two runs can be compared field by field.

use crate::error::TableExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default location of the append-only page text log.
pub const DEFAULT_TEXT_LOG: &str = "json_extracted/page_text_extracted.jsonl";
/// Default location of the table log.
pub const DEFAULT_TABLE_LOG: &str = "json_extracted/table_metadata_from_pdf.jsonl";

/// Configuration for one extraction run over one PDF.
///
/// # Example
/// ```rust
/// use pdf_table_skeleton::{ExtractionConfig, TargetPages};
///
/// let config = ExtractionConfig::builder()
///     .pdf_path("raws_split/report_part02.pdf")
///     .pages(TargetPages::new(vec![1, 3, 5]))
///     .dpi(200)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// PDF to read.
    pub pdf_path: PathBuf,

    /// Pages to analyse, 1-based, processed in this order.
    pub pages: TargetPages,

    /// Append-only page cache. Default: [`DEFAULT_TEXT_LOG`].
    pub text_log: PathBuf,

    /// Rewritten wholesale at the end of every run. Default: [`DEFAULT_TABLE_LOG`].
    pub table_log: PathBuf,

    /// Rendering resolution. Range: 72–400. Default: 200.
    ///
    /// Financial reports use small print in table footers; 200 DPI keeps
    /// digits legible to the OCR model.
    pub dpi: u32,

    /// Longest rendered edge in pixels, independent of DPI. Default: 3000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory containing the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider used for every model stage. Takes precedence
    /// over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Vision model for raw OCR. Default: "gpt-4o".
    pub ocr_model: String,

    /// Tool-calling model for page structuring. Default: "o3".
    pub structure_model: String,

    /// Tool-calling model for table skeletons. Default: "o3".
    pub skeleton_model: String,

    /// Which skeleton engine analyses table blocks. Default: [`SkeletonBackend::Llm`].
    pub skeleton_backend: SkeletonBackend,

    /// Sampling temperature for every model call. Default: 0.0.
    pub temperature: f32,

    /// Output-token cap for the OCR call. Default: 4096.
    pub ocr_max_tokens: usize,

    /// Output-token cap for the structuring call. Default: 8192.
    ///
    /// A page with three dense tables serialises to well over 4k tokens of
    /// tool-call arguments.
    pub structure_max_tokens: usize,

    /// Output-token cap for the skeleton call. Default: 8192.
    ///
    /// The answer itself is small, but reasoning models spend part of the cap
    /// before they emit the call.
    pub skeleton_max_tokens: usize,

    /// Character budget for a markdown table sent to the skeleton stage. Default: 8000.
    pub skeleton_char_budget: usize,

    /// Optional progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_path: PathBuf::new(),
            pages: TargetPages::default(),
            text_log: PathBuf::from(DEFAULT_TEXT_LOG),
            table_log: PathBuf::from(DEFAULT_TABLE_LOG),
            dpi: 200,
            max_rendered_pixels: 3000,
            password: None,
            pdfium_lib_path: None,
            provider_name: None,
            provider: None,
            ocr_model: "gpt-4o".to_string(),
            structure_model: "o3".to_string(),
            skeleton_model: "o3".to_string(),
            skeleton_backend: SkeletonBackend::default(),
            temperature: 0.0,
            ocr_max_tokens: 4096,
            structure_max_tokens: 8192,
            skeleton_max_tokens: 8192,
            skeleton_char_budget: 8000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("pdf_path", &self.pdf_path)
            .field("pages", &self.pages)
            .field("text_log", &self.text_log)
            .field("table_log", &self.table_log)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("ocr_model", &self.ocr_model)
            .field("structure_model", &self.structure_model)
            .field("skeleton_model", &self.skeleton_model)
            .field("skeleton_backend", &self.skeleton_backend)
            .field("temperature", &self.temperature)
            .field("ocr_max_tokens", &self.ocr_max_tokens)
            .field("structure_max_tokens", &self.structure_max_tokens)
            .field("skeleton_max_tokens", &self.skeleton_max_tokens)
            .field("skeleton_char_budget", &self.skeleton_char_budget)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn pdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdf_path = path.into();
        self
    }

    pub fn pages(mut self, pages: TargetPages) -> Self {
        self.config.pages = pages;
        self
    }

    pub fn text_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.text_log = path.into();
        self
    }

    pub fn table_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.table_log = path.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn structure_model(mut self, model: impl Into<String>) -> Self {
        self.config.structure_model = model.into();
        self
    }

    pub fn skeleton_model(mut self, model: impl Into<String>) -> Self {
        self.config.skeleton_model = model.into();
        self
    }

    pub fn skeleton_backend(mut self, backend: SkeletonBackend) -> Self {
        self.config.skeleton_backend = backend;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn ocr_max_tokens(mut self, n: usize) -> Self {
        self.config.ocr_max_tokens = n;
        self
    }

    pub fn structure_max_tokens(mut self, n: usize) -> Self {
        self.config.structure_max_tokens = n;
        self
    }

    pub fn skeleton_max_tokens(mut self, n: usize) -> Self {
        self.config.skeleton_max_tokens = n;
        self
    }

    pub fn skeleton_char_budget(mut self, chars: usize) -> Self {
        self.config.skeleton_char_budget = chars;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, TableExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(TableExtractError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.pages.is_empty() {
            return Err(TableExtractError::InvalidConfig(
                "At least one target page is required".into(),
            ));
        }
        if c.skeleton_char_budget == 0 {
            return Err(TableExtractError::InvalidConfig(
                "Skeleton character budget must be ≥ 1".into(),
            ));
        }
        if c.text_log == c.table_log {
            return Err(TableExtractError::InvalidConfig(format!(
                "Text log and table log must differ (both '{}')",
                c.text_log.display()
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Engine used to turn one markdown table into a [`crate::TableSkeleton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkeletonBackend {
    /// Schema-constrained tool call to `skeleton_model`. (default)
    #[default]
    Llm,
    /// Deterministic analysis of the markdown itself; no model call.
    Markdown,
}

/// The hand-supplied list of pages to analyse.
///
/// Pages are 1-based and kept in the order given; a repeated page keeps only
/// its first occurrence. Out-of-range pages are not rejected here because the
/// page count is only known once the PDF is opened; the orchestrator skips
/// them with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPages(Vec<u32>);

impl TargetPages {
    pub fn new(pages: impl IntoIterator<Item = u32>) -> Self {
        let mut seen = std::collections::HashSet::new();
        Self(pages.into_iter().filter(|p| seen.insert(*p)).collect())
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for TargetPages {
    type Err = TableExtractError;

    /// Parse `1,3,5-8` style lists. Ranges are inclusive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut pages = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((start, end)) = part.split_once('-') {
                let start = parse_page(start)?;
                let end = parse_page(end)?;
                if start > end {
                    return Err(TableExtractError::InvalidConfig(format!(
                        "Invalid page range '{part}': start must be <= end"
                    )));
                }
                pages.extend(start..=end);
            } else {
                pages.push(parse_page(part)?);
            }
        }
        if pages.is_empty() {
            return Err(TableExtractError::InvalidConfig(format!(
                "No pages in '{s}'"
            )));
        }
        Ok(Self::new(pages))
    }
}

fn parse_page(s: &str) -> Result<u32, TableExtractError> {
    let page: u32 = s
        .trim()
        .parse()
        .map_err(|_| TableExtractError::InvalidConfig(format!("Invalid page number: '{}'", s.trim())))?;
    if page < 1 {
        return Err(TableExtractError::InvalidConfig(format!(
            "Pages are 1-indexed, minimum is 1 (got {page})"
        )));
    }
    Ok(page)
}
