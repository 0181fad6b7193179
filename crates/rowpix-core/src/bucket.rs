//! Row bucketing: which images belong to which row.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::anchor::Anchor;
use crate::MAX_ROWS;

/// Parameters for [`locate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocateParams {
    /// First row to consider (1-based)
    pub start_row: u32,
    /// Column the images are expected in. `None` accepts any column.
    pub target_col: Option<u32>,
    /// How many columns an image may sit away from `target_col`
    pub col_tolerance: u32,
}

impl LocateParams {
    /// Whether an image at `col` passes the column-tolerance rule.
    ///
    /// An unknown column is accepted: the anchor could not say where the
    /// image sits, so it is not excluded on that ground.
    pub fn accepts_col(&self, col: Option<u32>) -> bool {
        match (self.target_col, col) {
            (None, _) | (_, None) => true,
            (Some(target), Some(col)) => col.abs_diff(target) <= self.col_tolerance,
        }
    }
}

/// Images grouped by anchor row, in encounter order within a row.
#[derive(Debug, Clone)]
pub struct RowBuckets<T> {
    rows: BTreeMap<u32, Vec<T>>,
    max_anchor_row: u32,
    dropped: usize,
    start_row: u32,
}

impl<T> RowBuckets<T> {
    /// Images bucketed for `row`; empty when there are none.
    pub fn get(&self, row: u32) -> &[T] {
        self.rows.get(&row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_row(&self, row: u32) -> bool {
        self.rows.contains_key(&row)
    }

    /// Bucketed rows in ascending order
    pub fn rows(&self) -> impl Iterator<Item = (u32, &[T])> + '_ {
        self.rows.iter().map(|(r, v)| (*r, v.as_slice()))
    }

    /// Highest row touched by any resolved anchor, including rows below the
    /// start row and images rejected by the column rule. 0 when none resolved.
    pub fn max_anchor_row(&self) -> u32 {
        self.max_anchor_row
    }

    /// Number of images whose anchor could not be resolved
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Total number of bucketed images
    pub fn image_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows to walk during export: from the start row to the larger of the
    /// sheet's own extent and the lowest image. Rows holding nothing but a
    /// picture have no cell value and would otherwise fall off the end.
    /// Never runs past the last worksheet row.
    pub fn scan_range(&self, declared_max_row: u32) -> RangeInclusive<u32> {
        self.start_row..=declared_max_row.max(self.max_anchor_row).min(MAX_ROWS)
    }
}

/// Bucket `items` by the row of their anchor.
///
/// Each item comes with its resolved anchor, or `None` when resolution
/// failed; those are counted in [`RowBuckets::dropped`] and skipped.
pub fn locate<T, I>(items: I, params: LocateParams) -> RowBuckets<T>
where
    I: IntoIterator<Item = (Option<Anchor>, T)>,
{
    let mut buckets = RowBuckets {
        rows: BTreeMap::new(),
        max_anchor_row: 0,
        dropped: 0,
        start_row: params.start_row,
    };

    for (idx, (anchor, item)) in items.into_iter().enumerate() {
        let Some(anchor) = anchor else {
            log::debug!("image #{} anchor could not be resolved", idx + 1);
            buckets.dropped += 1;
            continue;
        };

        buckets.max_anchor_row = buckets.max_anchor_row.max(anchor.row);

        if anchor.row < params.start_row {
            continue;
        }

        if !params.accepts_col(anchor.col) {
            log::debug!(
                "image #{} at row={} col={:?} outside column tolerance",
                idx + 1,
                anchor.row,
                anchor.col
            );
            continue;
        }

        buckets.rows.entry(anchor.row).or_default().push(item);
    }

    buckets
}
