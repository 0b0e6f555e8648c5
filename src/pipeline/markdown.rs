//! Markdown table helpers shared by the skeleton stage.
//!
//! The structuring model hands us each table as one GFM pipe-table string.
//! Nothing here interprets model output as JSON; these helpers only classify
//! lines of an already-typed `Section::content` so that the skeleton stage
//! can truncate it safely and, for the markdown backend, measure it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static RE_SEPARATOR_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?$").expect("separator regex is valid")
});

/// A pipe-table row: `| a | b |`.
pub fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

/// The `|---|:---:|` line under a header row.
pub fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && RE_SEPARATOR_ROW.is_match(trimmed)
}

/// Trimmed cell texts of a pipe-table row.
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Byte spans `(start, end)` of each line, newline excluded.
fn line_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for line in text.split('\n') {
        spans.push((start, start + line.len()));
        start += line.len() + 1;
    }
    spans
}

/// Index (into `spans`) of the last line of the header block: the first
/// table row, plus its separator row when one follows.
fn header_block_last_line(text: &str, spans: &[(usize, usize)]) -> usize {
    let line = |i: usize| &text[spans[i].0..spans[i].1];
    let header = (0..spans.len())
        .find(|&i| is_table_row(line(i)))
        .or_else(|| (0..spans.len()).find(|&i| !line(i).trim().is_empty()))
        .unwrap_or(0);
    if header + 1 < spans.len() && is_separator_row(line(header + 1)) {
        header + 1
    } else {
        header
    }
}

/// Cut a markdown table down to at most `budget` characters.
///
/// Only whole lines are kept and only trailing lines are dropped. The header
/// row and its separator are always kept, even if they alone exceed the
/// budget.
pub fn truncate_table(markdown: &str, budget: usize) -> Cow<'_, str> {
    if markdown.chars().count() <= budget {
        return Cow::Borrowed(markdown);
    }

    let spans = line_spans(markdown);
    let header_last = header_block_last_line(markdown, &spans);
    let mut end = spans[header_last].1;
    let mut used = markdown[..end].chars().count();

    for &(start, line_end) in &spans[header_last + 1..] {
        // +1 for the newline joining this line to the kept prefix
        let cost = markdown[start..line_end].chars().count() + 1;
        if used + cost > budget {
            break;
        }
        used += cost;
        end = line_end;
    }

    Cow::Owned(markdown[..end].to_string())
}

/// Structure of a pipe table as read directly from its markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownTable {
    /// Non-table text line preceding the header row, if any.
    pub caption: Option<String>,
    pub header: Vec<String>,
    /// First-column cell of each data row, in order, blanks included.
    pub first_column: Vec<String>,
    pub data_rows: usize,
}

impl MarkdownTable {
    /// Parse a pipe table. Returns `None` when the text contains no table row.
    ///
    /// Blank lines between table rows do not end the table, and a later row
    /// identical to the header (the header of a conjoined second table) is
    /// counted as a header row, not data.
    pub fn parse(markdown: &str) -> Option<Self> {
        let text = markdown.replace("\r\n", "\n");
        let mut lines = text.lines();

        let mut caption = None;
        let header = loop {
            let line = lines.next()?;
            if is_table_row(line) {
                break split_cells(line);
            }
            let label = line.trim().trim_start_matches('#').trim().trim_matches('*').trim();
            if caption.is_none() && !label.is_empty() {
                caption = Some(label.to_string());
            }
        };

        let mut first_column = Vec::new();
        for line in lines {
            if !is_table_row(line) || is_separator_row(line) {
                continue;
            }
            let cells = split_cells(line);
            if cells == header {
                continue;
            }
            first_column.push(cells.into_iter().next().unwrap_or_default());
        }

        Some(Self {
            caption,
            data_rows: first_column.len(),
            header,
            first_column,
        })
    }

    /// Unique, non-empty first-column labels in order of appearance.
    pub fn row_labels(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.first_column
            .iter()
            .filter(|c| !c.is_empty())
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect()
    }
}
