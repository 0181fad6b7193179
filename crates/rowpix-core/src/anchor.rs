//! Image anchors: where a picture is attached to the grid.

use crate::address::CellAddress;
use crate::{MAX_COLS, MAX_ROWS};

/// A DrawingML `<xdr:from>` marker. Both fields are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMarker {
    pub col: u32,
    pub row: u32,
}

/// Anchor metadata as found in the source, before resolution.
///
/// Producers disagree about how they record positions, so up to three
/// representations may be present. [`RawAnchor::resolve`] uses the first one
/// that yields a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAnchor {
    /// Structured `from` marker (0-based)
    pub from: Option<AnchorMarker>,
    /// Textual cell coordinate such as `"B7"` (1-based)
    pub cell_ref: Option<String>,
    /// Loose name/value pairs, matched case-insensitively (0-based values)
    pub fields: Vec<(String, String)>,
}

/// A resolved anchor. Row and column are 1-based; the column is unknown when
/// only the row could be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub row: u32,
    pub col: Option<u32>,
}

impl Anchor {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col: Some(col),
        }
    }
}

impl RawAnchor {
    pub fn from_marker(col: u32, row: u32) -> Self {
        Self {
            from: Some(AnchorMarker { col, row }),
            ..Self::default()
        }
    }

    pub fn from_cell_ref(cell_ref: impl Into<String>) -> Self {
        Self {
            cell_ref: Some(cell_ref.into()),
            ..Self::default()
        }
    }

    /// Resolve to a 1-based position, or `None` when nothing usable is present.
    ///
    /// Positions outside the worksheet grid count as unusable.
    pub fn resolve(&self) -> Option<Anchor> {
        if let Some(from) = self.from {
            return Some(Anchor::new(
                one_based(from.row, MAX_ROWS)?,
                one_based(from.col, MAX_COLS)?,
            ));
        }

        if let Some(addr) = self
            .cell_ref
            .as_deref()
            .and_then(|s| CellAddress::parse(s).ok())
        {
            return Some(Anchor::new(addr.row, addr.col));
        }

        let row = one_based(self.field(&["row"])?, MAX_ROWS)?;
        let col = match self.field(&["col", "column"]) {
            Some(c) => Some(one_based(c, MAX_COLS)?),
            None => None,
        };
        Some(Anchor { row, col })
    }

    fn field(&self, names: &[&str]) -> Option<u32> {
        self.fields
            .iter()
            .find(|(key, _)| names.iter().any(|n| key.trim().eq_ignore_ascii_case(n)))
            .and_then(|(_, value)| value.trim().parse().ok())
    }
}

/// Shift a 0-based index to 1-based, rejecting anything past `limit`.
fn one_based(index: u32, limit: u32) -> Option<u32> {
    index.checked_add(1).filter(|&n| n <= limit)
}
