//! PDF rasterisation: render one target page to PNG bytes via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not run on a Tokio worker. Every call moves onto the
//! blocking pool, binds the library, opens the document and renders a single
//! page. Only a handful of target pages are rendered per report, and cached
//! pages are never rendered at all, so reopening the document per page costs
//! little and keeps no pdfium handle alive across awaits.

use crate::config::ExtractionConfig;
use crate::error::{StageError, TableExtractError};
use crate::pipeline::encode;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterises pages of one document.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Number of pages in the document.
    async fn page_count(&self) -> Result<usize, TableExtractError>;

    /// Render 1-based `page` at `dpi` and return PNG bytes.
    async fn render(&self, page: u32, dpi: u32) -> Result<Vec<u8>, StageError>;
}

/// [`PageRenderer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    pdf_path: PathBuf,
    password: Option<String>,
    lib_dir: Option<PathBuf>,
    max_pixels: u32,
}

impl PdfiumRenderer {
    /// Validate that `config.pdf_path` is a readable PDF and prepare a renderer for it.
    pub fn open(config: &ExtractionConfig) -> Result<Self, TableExtractError> {
        validate_pdf(&config.pdf_path)?;
        Ok(Self {
            pdf_path: config.pdf_path.clone(),
            password: config.password.clone(),
            lib_dir: config.pdfium_lib_path.clone(),
            max_pixels: config.max_rendered_pixels,
        })
    }
}

#[async_trait]
impl PageRenderer for PdfiumRenderer {
    async fn page_count(&self) -> Result<usize, TableExtractError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(this.lib_dir.as_deref())?;
            let document = load_document(&pdfium, &this.pdf_path, this.password.as_deref())?;
            let total = document.pages().len() as usize;
            info!("PDF loaded: {} pages", total);
            Ok(total)
        })
        .await
        .map_err(|e| TableExtractError::Internal(format!("Page-count task panicked: {e}")))?
    }

    async fn render(&self, page: u32, dpi: u32) -> Result<Vec<u8>, StageError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.render_blocking(page, dpi))
            .await
            .map_err(|e| StageError::RenderFailed {
                page,
                detail: format!("render task panicked: {e}"),
            })?
    }
}

impl PdfiumRenderer {
    fn render_blocking(&self, page_num: u32, dpi: u32) -> Result<Vec<u8>, StageError> {
        let fail = |detail: String| StageError::RenderFailed {
            page: page_num,
            detail,
        };

        let pdfium = bind_pdfium(self.lib_dir.as_deref()).map_err(|e| fail(e.to_string()))?;
        let document = load_document(&pdfium, &self.pdf_path, self.password.as_deref())
            .map_err(|e| fail(e.to_string()))?;

        let index = page_num
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| fail(format!("page {page_num} is not addressable")))?;
        let pages = document.pages();
        let page = pages.get(index).map_err(|e| fail(format!("{e:?}")))?;

        // PDF user space is 72 points per inch.
        let scale = dpi as f32 / 72.0;
        let (width, height) = fit_within(
            page.width().value * scale,
            page.height().value * scale,
            self.max_pixels as f32,
        );

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|e| fail(format!("{e:?}")))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at {} DPI → {}x{} px",
            page_num,
            dpi,
            image.width(),
            image.height()
        );

        encode::encode_png(&image).map_err(|e| fail(format!("PNG encoding failed: {e}")))
    }
}

/// Scale `(w, h)` down so the longest edge is at most `max`, keeping aspect.
fn fit_within(w: f32, h: f32, max: f32) -> (i32, i32) {
    let longest = w.max(h);
    let factor = if longest > max { max / longest } else { 1.0 };
    (
        ((w * factor).round() as i32).max(1),
        ((h * factor).round() as i32).max(1),
    )
}

fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, TableExtractError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
            &*dir.to_string_lossy(),
        )),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| TableExtractError::PdfiumBindingFailed(e.to_string()))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, TableExtractError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                TableExtractError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                TableExtractError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            TableExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Check existence, readability and the `%PDF` magic before pdfium sees the file.
fn validate_pdf(path: &Path) -> Result<(), TableExtractError> {
    if !path.exists() {
        return Err(TableExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(TableExtractError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TableExtractError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(TableExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}
