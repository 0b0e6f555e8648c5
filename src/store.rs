//! Persistence for the two JSONL logs.
//!
//! ## Text log (page cache)
//!
//! Append-only, one [`PageRecord`] per line. At startup the whole file is
//! read and every successful structured page becomes a cache entry; a page
//! in the cache never goes through OCR or structuring again. Failed lines
//! are kept on disk for inspection but never loaded, so the next run retries
//! those pages. A corrupt line is logged and skipped rather than aborting
//! the run.
//!
//! ## Table log
//!
//! Rewritten wholesale at the end of every run. The new content is written
//! to a temporary file in the same directory and renamed over the old one,
//! so a crash mid-write leaves the previous log intact.

use crate::error::TableExtractError;
use crate::output::{PageRecord, StructuredPage, TableRecord};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Successfully structured pages from earlier runs, keyed by the record's
/// `page`. The model-written `page_number` inside the page is not trusted.
#[derive(Debug, Clone, Default)]
pub struct PageCache {
    pages: HashMap<u32, StructuredPage>,
}

impl PageCache {
    pub fn get(&self, page: u32) -> Option<&StructuredPage> {
        self.pages.get(&page)
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains_key(&page)
    }

    /// Later inserts for the same page replace earlier ones.
    pub fn insert(&mut self, page_no: u32, page: StructuredPage) {
        self.pages.insert(page_no, page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Repository for page records.
pub trait PageStore: Send + Sync {
    /// Read every cacheable record.
    fn load(&self) -> Result<PageCache, TableExtractError>;

    /// Append `records` after everything already stored.
    fn append(&self, records: &[PageRecord]) -> Result<(), TableExtractError>;
}

/// [`PageStore`] backed by a JSONL file.
#[derive(Debug, Clone)]
pub struct JsonlPageStore {
    path: PathBuf,
}

impl JsonlPageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageStore for JsonlPageStore {
    fn load(&self) -> Result<PageCache, TableExtractError> {
        let mut cache = PageCache::default();
        if !self.path.exists() {
            debug!("No text log at {}, starting cold", self.path.display());
            return Ok(cache);
        }

        let read_err = |source| TableExtractError::TextLogReadFailed {
            path: self.path.clone(),
            source,
        };
        let reader = BufReader::new(File::open(&self.path).map_err(read_err)?);

        for (n, line) in reader.lines().enumerate() {
            let line = line.map_err(read_err)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PageRecord>(&line) {
                Ok(record) => match record.cached_page() {
                    Some(page) => cache.insert(record.page, page.clone()),
                    None => debug!(
                        "{}:{}: page {} recorded as failed, not cached",
                        self.path.display(),
                        n + 1,
                        record.page
                    ),
                },
                Err(e) => warn!(
                    "{}:{}: skipping malformed record: {}",
                    self.path.display(),
                    n + 1,
                    e
                ),
            }
        }

        info!(
            "Loaded {} cached pages from {}",
            cache.len(),
            self.path.display()
        );
        Ok(cache)
    }

    fn append(&self, records: &[PageRecord]) -> Result<(), TableExtractError> {
        if records.is_empty() {
            return Ok(());
        }
        let write_err = |source| TableExtractError::TextLogWriteFailed {
            path: self.path.clone(),
            source,
        };

        create_parent(&self.path).map_err(write_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record).map_err(|e| write_err(e.into()))?;
            writer.write_all(b"\n").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;

        debug!(
            "Appended {} page records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Replace the table log at `path` with `records`, atomically.
pub fn write_table_log(path: &Path, records: &[TableRecord]) -> Result<(), TableExtractError> {
    let write_err = |source| TableExtractError::TableLogWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    create_parent(path).map_err(write_err)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        for record in records {
            serde_json::to_writer(&mut writer, record).map_err(|e| write_err(e.into()))?;
            writer.write_all(b"\n").map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} table records to {}", records.len(), path.display());
    Ok(())
}

/// Read a table log written by [`write_table_log`].
///
/// Unlike the text log, a malformed line here is an error: this file is
/// only ever produced whole by this crate.
pub fn read_table_log(path: &Path) -> Result<Vec<TableRecord>, TableExtractError> {
    let read_err = |source| TableExtractError::TableLogReadFailed {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(read_err)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(read_err)?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line).map_err(|e| read_err(e.into()))?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Stage, StageError};
    use crate::output::{Position, Section, SectionType, TableSkeleton};

    fn page(n: u32, text: &str) -> StructuredPage {
        StructuredPage {
            page_number: n,
            has_tables: false,
            table_count: 0,
            formatted_text: text.to_string(),
            sections: vec![Section {
                kind: SectionType::Paragraph,
                content: text.to_string(),
                position: Position::Top,
            }],
        }
    }

    #[test]
    fn missing_text_log_is_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlPageStore::new(dir.path().join("pages.jsonl"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlPageStore::new(dir.path().join("nested/pages.jsonl"));
        let err = StageError::Transport {
            stage: Stage::Ocr,
            detail: "503".into(),
        };
        store
            .append(&[PageRecord::success(page(1, "one")), PageRecord::failed(2, &err)])
            .unwrap();

        let cache = store.load().unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
    }

    #[test]
    fn last_success_wins_and_bad_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.jsonl");
        let store = JsonlPageStore::new(&path);
        store.append(&[PageRecord::success(page(4, "old"))]).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n\n")
            .unwrap();
        store.append(&[PageRecord::success(page(4, "new"))]).unwrap();

        let cache = store.load().unwrap();
        assert_eq!(cache.get(4).unwrap().formatted_text, "new");
    }

    #[test]
    fn table_log_is_replaced_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/tables.jsonl");
        let rec = |i: u32| {
            TableRecord::from_result(
                i,
                1,
                Ok(TableSkeleton {
                    caption: None,
                    column_count: 1,
                    row_count: 1,
                    column_headers: vec!["A".into()],
                    row_headers: vec![],
                    merged_from: None,
                }),
            )
        };

        write_table_log(&path, &[rec(1), rec(2)]).unwrap();
        write_table_log(&path, &[rec(1)]).unwrap();

        let back = read_table_log(&path).unwrap();
        assert_eq!(back, vec![rec(1)]);
    }

    #[test]
    fn empty_table_log_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.jsonl");
        write_table_log(&path, &[]).unwrap();
        assert!(path.exists());
        assert!(read_table_log(&path).unwrap().is_empty());
    }

    #[test]
    fn cache_is_keyed_by_record_page_not_model_page_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.jsonl");
        let line = serde_json::json!({
            "page": 3,
            "text_data": {
                "page_number": 1,
                "has_tables": false,
                "table_count": 0,
                "formatted_text": "page three",
                "sections": []
            },
            "extraction_status": "success"
        });
        std::fs::write(&path, format!("{line}\n")).unwrap();

        let cache = JsonlPageStore::new(&path).load().unwrap();
        assert!(cache.contains(3));
        assert!(!cache.contains(1));
        assert_eq!(cache.get(3).unwrap().formatted_text, "page three");
    }
}
