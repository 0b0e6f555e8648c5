//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator walks the target page list. Pages are processed
//! one at a time, so events for a page always arrive in order:
//! `on_page_start` → (`on_page_cached` | `on_page_error` | `on_page_complete`),
//! with `on_table_analyzed` between start and complete for each table block.
//!
//! # Example
//!
//! ```rust
//! use pdf_table_skeleton::{ExtractionConfig, ExtractionProgressCallback, TargetPages};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TableCounter(AtomicUsize);
//!
//! impl ExtractionProgressCallback for TableCounter {
//!     fn on_table_analyzed(&self, page: u32, table_index: u32, success: bool) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page}: table {table_index} ok={success}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .pages(TargetPages::new([1, 3]))
//!     .progress_callback(Arc::new(TableCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each target page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first page, with the length of the target list.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when an in-range page is picked up.
    fn on_page_start(&self, page: u32, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page is served from the text-log cache.
    fn on_page_cached(&self, page: u32, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called after every table block of a page has been analysed.
    ///
    /// # Arguments
    /// * `table_count`: table blocks found on the page
    fn on_page_complete(&self, page: u32, total_pages: usize, table_count: usize) {
        let _ = (page, total_pages, table_count);
    }

    /// Called when render, OCR or structuring fails, or the page is out of range.
    fn on_page_error(&self, page: u32, total_pages: usize, error: &str) {
        let _ = (page, total_pages, error);
    }

    /// Called once per table block, with its pre-merge index.
    fn on_table_analyzed(&self, page: u32, table_index: u32, success: bool) {
        let _ = (page, table_index, success);
    }

    /// Called once after the merge pass.
    ///
    /// # Arguments
    /// * `table_count`: records in the final table log
    fn on_run_complete(&self, total_pages: usize, table_count: usize) {
        let _ = (total_pages, table_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        cached: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        tables: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page: u32, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_cached(&self, _page: u32, _total: usize) {
            self.cached.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page: u32, _total: usize, _tables: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page: u32, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_table_analyzed(&self, _page: u32, _index: u32, _success: bool) {
            self.tables.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_page_start(1, 3);
        cb.on_page_cached(1, 3);
        cb.on_table_analyzed(1, 1, true);
        cb.on_page_complete(1, 3, 1);
        cb.on_page_error(2, 3, "ocr failed");
        cb.on_run_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2);
        tracker.on_page_cached(1, 2);
        tracker.on_table_analyzed(1, 1, true);
        tracker.on_table_analyzed(1, 2, false);
        tracker.on_page_complete(1, 2, 2);
        tracker.on_page_start(3, 2);
        tracker.on_page_error(3, 2, "structuring failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.cached.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.tables.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_page_complete(1, 10, 0);
    }
}
