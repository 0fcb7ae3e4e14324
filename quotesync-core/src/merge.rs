//! Incremental merge of a freshly fetched payload onto an existing artifact.
//!
//! The payload framing (header line plus any trailing blank or partial line)
//! is stripped, existing trailing rows that overlap the new window are
//! dropped, and the interior rows are appended. The newly fetched payload is
//! authoritative for the overlap period — the stale local copy is not.

use crate::source::SyncError;
use chrono::NaiveDate;

/// Result of merging a payload onto existing artifact contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Full artifact contents after the merge.
    pub contents: String,
    /// Number of interior rows taken from the payload.
    pub rows_appended: usize,
}

/// Parse the leading comma-separated field of a row as a `%Y-%m-%d` date.
pub fn leading_date(line: &str) -> Option<NaiveDate> {
    let field = line.split(',').next()?;
    NaiveDate::parse_from_str(field, "%Y-%m-%d").ok()
}

/// Interior data rows of a payload: everything after the header line, with
/// trailing blank or non-row lines stripped.
pub fn interior_rows(payload: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = payload.split('\n').collect();
    if !lines.is_empty() {
        lines.remove(0); // header
    }
    while let Some(last) = lines.last().copied() {
        if last.is_empty() || leading_date(last).is_none() {
            lines.pop();
        } else {
            break;
        }
    }
    lines
}

/// Merge a fetched payload onto existing artifact contents.
///
/// An empty interior (no new rows in the window) is a no-op: the result is
/// byte-identical to `existing`. Otherwise existing trailing rows dated on
/// or after the first interior row are dropped before concatenation, which
/// keeps the output date-ordered with no duplicate dates.
pub fn merge(existing: &str, payload: &str) -> Result<Merged, SyncError> {
    let interior = interior_rows(payload);
    if interior.is_empty() {
        return Ok(Merged {
            contents: existing.to_string(),
            rows_appended: 0,
        });
    }

    let cutoff = leading_date(interior[0]).ok_or(SyncError::ErrorPayload)?;

    let mut kept: Vec<&str> = existing.split('\n').collect();
    loop {
        match kept.last().copied() {
            Some(last) if last.is_empty() => {
                kept.pop();
            }
            Some(last) => match leading_date(last) {
                Some(d) if d >= cutoff => {
                    kept.pop();
                }
                // A non-row line here is the header; dated rows before the
                // cutoff are kept as-is.
                _ => break,
            },
            None => break,
        }
    }

    let rows_appended = interior.len();
    let mut contents = kept.join("\n");
    contents.push('\n');
    contents.push_str(&interior.join("\n"));
    contents.push('\n');

    Ok(Merged {
        contents,
        rows_appended,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str = "Date,Open,High,Low,Close,Adj Close,Volume";

    fn row(date: &str, close: f64) -> String {
        format!("{date},{close},{close},{close},{close},{close},1000")
    }

    fn payload(rows: &[String]) -> String {
        format!("{HEADER}\n{}\n", rows.join("\n"))
    }

    #[test]
    fn interior_strips_header_and_trailing_blank() {
        let p = payload(&[row("2024-01-02", 1.0), row("2024-01-03", 2.0)]);
        let interior = interior_rows(&p);
        assert_eq!(interior.len(), 2);
        assert!(interior[0].starts_with("2024-01-02"));
    }

    #[test]
    fn interior_strips_partial_footer() {
        let p = format!("{HEADER}\n{}\nnot-a-row", row("2024-01-02", 1.0));
        let interior = interior_rows(&p);
        assert_eq!(interior.len(), 1);
    }

    #[test]
    fn merge_drops_overlapping_tail() {
        let existing = payload(&[
            row("2024-01-02", 1.0),
            row("2024-01-03", 2.0),
            row("2024-01-04", 3.0),
        ]);
        // Remote re-serves Jan 4 with a corrected close alongside Jan 5.
        let p = payload(&[row("2024-01-04", 3.5), row("2024-01-05", 4.0)]);

        let merged = merge(&existing, &p).unwrap();
        assert_eq!(merged.rows_appended, 2);

        let lines: Vec<&str> = merged.contents.lines().collect();
        assert_eq!(lines.len(), 5); // header + 4 rows
        assert_eq!(lines[3], row("2024-01-04", 3.5));
        assert_eq!(lines[4], row("2024-01-05", 4.0));
    }

    #[test]
    fn merge_of_empty_window_is_byte_identical() {
        let existing = payload(&[row("2024-01-02", 1.0), row("2024-01-03", 2.0)]);
        let merged = merge(&existing, &format!("{HEADER}\n")).unwrap();
        assert_eq!(merged.rows_appended, 0);
        assert_eq!(merged.contents, existing);
    }

    #[test]
    fn merge_without_overlap_appends() {
        let existing = payload(&[row("2024-01-02", 1.0)]);
        let p = payload(&[row("2024-01-03", 2.0)]);
        let merged = merge(&existing, &p).unwrap();
        assert_eq!(merged.rows_appended, 1);
        assert!(merged.contents.ends_with(&format!("{}\n", row("2024-01-03", 2.0))));
    }

    #[test]
    fn json_error_body_has_no_interior_rows() {
        let p = "{\"finance\":{\"error\":{\"code\":\"Not Found\"}}}";
        assert_eq!(interior_rows(p).len(), 0);
    }

    #[test]
    fn merge_rejects_dateless_leading_row() {
        let existing = payload(&[row("2024-01-02", 1.0)]);
        let p = format!("header\ngarbage\n{}\n", row("2024-01-03", 2.0));
        assert!(matches!(merge(&existing, &p), Err(SyncError::ErrorPayload)));
    }

    proptest! {
        /// Merged output stays strictly date-ordered with no duplicates.
        #[test]
        fn merged_rows_ordered_and_unique(
            existing_len in 1usize..30,
            overlap in 0usize..10,
            new_len in 1usize..30,
        ) {
            let base = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
            let overlap = overlap.min(existing_len);

            let existing_rows: Vec<String> = (0..existing_len)
                .map(|i| row(&(base + chrono::Duration::days(i as i64)).to_string(), 1.0))
                .collect();
            let new_start = existing_len - overlap;
            let new_rows: Vec<String> = (0..new_len)
                .map(|i| {
                    let d = base + chrono::Duration::days((new_start + i) as i64);
                    row(&d.to_string(), 2.0)
                })
                .collect();

            let merged = merge(&payload(&existing_rows), &payload(&new_rows)).unwrap();
            let dates: Vec<NaiveDate> = merged
                .contents
                .lines()
                .filter_map(leading_date)
                .collect();

            prop_assert_eq!(dates.len(), new_start + new_len);
            for pair in dates.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
