use crate::records::ResultRecord;
use std::cmp::Ordering;

/// Half-up 2-decimal rounding used for displayed percentages:
/// `Int(100*x + 0.5) / 100`
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

/// Total marks scored. Records written by the single-field revisions carry
/// no subject map; their own `obtained` field is the total.
pub fn total(record: &ResultRecord) -> u32 {
    if record.subjects.is_empty() {
        record.obtained
    } else {
        record.subjects.values().map(|s| s.obtained).sum()
    }
}

/// Percentage derived from the stored totals. This is the single source of
/// truth for display; the record's creation-time `percentage` field is
/// layout compatibility only.
pub fn percentage(record: &ResultRecord) -> f64 {
    if record.maximum == 0 {
        return 0.0;
    }
    100.0 * f64::from(total(record)) / f64::from(record.maximum)
}

/// 1-based position of the first record with this roll number when the
/// collection is ordered by descending percentage. The sort is stable, so
/// ties keep insertion order; duplicate roll numbers resolve to the first
/// match. Recomputed on every call because the collection may have changed.
pub fn rank(records: &[ResultRecord], roll_no: i64) -> Option<usize> {
    let mut order: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (i, percentage(r)))
        .collect();
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    order
        .iter()
        .position(|&(i, _)| records[i].roll_no == roll_no)
        .map(|p| p + 1)
}
