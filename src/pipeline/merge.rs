//! Fuse tables that a page layout split in two.
//!
//! A long table is often OCR'd as two blocks on the same page with the same
//! header row. The merge pass joins such neighbours once, left to right.
//! It is pairwise and non-transitive: three mergeable records in a row become
//! `(1+2), 3`, and `3` is then compared only with what follows it.

use crate::output::{ExtractionStatus, TableMeta, TableRecord, TableSkeleton};
use tracing::debug;

/// Result of one merge pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records with `table_index` reassigned to `1..=N`.
    pub records: Vec<TableRecord>,
    pub merges: usize,
}

fn mergeable(a: &TableRecord, b: &TableRecord) -> bool {
    match (a.skeleton(), b.skeleton()) {
        (Some(sa), Some(sb)) => a.page == b.page && sa.column_headers == sb.column_headers,
        _ => false,
    }
}

fn fuse(a: &TableSkeleton, b: &TableSkeleton, indices: [u32; 2]) -> TableSkeleton {
    let caption = [&a.caption, &b.caption]
        .into_iter()
        .flatten()
        .find(|c| !c.trim().is_empty())
        .cloned();
    let mut row_headers = a.row_headers.clone();
    row_headers.extend(b.row_headers.iter().cloned());

    TableSkeleton {
        caption,
        column_count: a.column_count,
        row_count: a.row_count + b.row_count,
        column_headers: a.column_headers.clone(),
        row_headers,
        merged_from: Some(indices),
    }
}

/// Merge adjacent same-page, same-header tables, then renumber.
pub fn merge_consecutive_tables(records: Vec<TableRecord>) -> MergeOutcome {
    let mut merged = Vec::with_capacity(records.len());
    let mut merges = 0;
    let mut i = 0;

    while i < records.len() {
        let current = &records[i];
        match records.get(i + 1) {
            Some(next) if mergeable(current, next) => {
                let indices = [current.table_index, next.table_index];
                // Both sides are successful skeletons, checked by `mergeable`.
                if let (Some(a), Some(b)) = (current.skeleton(), next.skeleton()) {
                    debug!(
                        "Merging tables {} and {} on page {}",
                        indices[0], indices[1], current.page
                    );
                    merged.push(TableRecord {
                        table_index: current.table_index,
                        page: current.page,
                        meta: TableMeta::Skeleton(fuse(a, b, indices)),
                        extraction_status: ExtractionStatus::Success,
                    });
                    merges += 1;
                }
                i += 2;
            }
            _ => {
                merged.push(current.clone());
                i += 1;
            }
        }
    }

    for (n, record) in merged.iter_mut().enumerate() {
        record.table_index = n as u32 + 1;
    }

    MergeOutcome {
        records: merged,
        merges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Stage, StageError};

    fn table(index: u32, page: u32, headers: &[&str], rows: &[&str]) -> TableRecord {
        TableRecord::from_result(
            index,
            page,
            Ok(TableSkeleton {
                caption: None,
                column_count: headers.len() as u32,
                row_count: rows.len() as u32,
                column_headers: headers.iter().map(|s| s.to_string()).collect(),
                row_headers: rows.iter().map(|s| s.to_string()).collect(),
                merged_from: None,
            }),
        )
    }

    fn failed(index: u32, page: u32) -> TableRecord {
        TableRecord::from_result(
            index,
            page,
            Err(StageError::Transport {
                stage: Stage::Skeleton,
                detail: "timeout".into(),
            }),
        )
    }

    #[test]
    fn split_table_is_fused() {
        let out = merge_consecutive_tables(vec![
            table(1, 3, &["A", "B"], &["x", "y"]),
            table(2, 3, &["A", "B"], &["z", "x", "w"]),
        ]);
        assert_eq!(out.merges, 1);
        assert_eq!(out.records.len(), 1);
        let rec = &out.records[0];
        assert_eq!(rec.table_index, 1);
        assert_eq!(rec.page, 3);
        let s = rec.skeleton().unwrap();
        assert_eq!(s.row_count, 5);
        assert_eq!(s.column_headers, vec!["A", "B"]);
        assert_eq!(s.row_headers, vec!["x", "y", "z", "x", "w"]);
        assert_eq!(s.merged_from, Some([1, 2]));
    }

    #[test]
    fn merge_is_not_transitive() {
        let out = merge_consecutive_tables(vec![
            table(1, 2, &["A"], &["a"]),
            table(2, 2, &["A"], &["b"]),
            table(3, 2, &["A"], &["c"]),
        ]);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].skeleton().unwrap().merged_from, Some([1, 2]));
        assert_eq!(out.records[1].skeleton().unwrap().merged_from, None);
        assert_eq!(out.records[1].table_index, 2);
    }

    #[test]
    fn different_page_or_headers_stay_apart() {
        let out = merge_consecutive_tables(vec![
            table(1, 1, &["A", "B"], &["a"]),
            table(2, 2, &["A", "B"], &["b"]),
            table(3, 2, &["B", "A"], &["c"]),
        ]);
        assert_eq!(out.merges, 0);
        assert_eq!(out.records.len(), 3);
    }

    #[test]
    fn failed_records_never_merge() {
        let out = merge_consecutive_tables(vec![failed(1, 4), failed(2, 4), table(3, 4, &["A"], &["a"])]);
        assert_eq!(out.merges, 0);
        assert_eq!(out.records.len(), 3);
        assert!(out.records[0].skeleton().is_none());
    }

    #[test]
    fn indices_are_contiguous_after_merge() {
        let out = merge_consecutive_tables(vec![
            table(1, 1, &["A"], &["a"]),
            table(2, 1, &["A"], &["b"]),
            failed(3, 1),
            table(4, 5, &["Q1", "Q2"], &["c"]),
            table(5, 5, &["Q1", "Q2"], &["d"]),
        ]);
        let indices: Vec<u32> = out.records.iter().map(|r| r.table_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(out.records[2].skeleton().unwrap().merged_from, Some([4, 5]));
    }

    #[test]
    fn caption_is_first_non_empty() {
        let mut a = table(1, 1, &["A"], &["a"]);
        let mut b = table(2, 1, &["A"], &["b"]);
        if let TableMeta::Skeleton(s) = &mut a.meta {
            s.caption = Some(" ".into());
        }
        if let TableMeta::Skeleton(s) = &mut b.meta {
            s.caption = Some("Loans by segment".into());
        }
        let out = merge_consecutive_tables(vec![a, b]);
        assert_eq!(
            out.records[0].skeleton().unwrap().caption.as_deref(),
            Some("Loans by segment")
        );
    }

    #[test]
    fn empty_input() {
        let out = merge_consecutive_tables(Vec::new());
        assert!(out.records.is_empty());
        assert_eq!(out.merges, 0);
    }
}
