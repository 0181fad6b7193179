//! # rowpix-core
//!
//! Backend-independent pieces of rowpix:
//! - [`ColumnRef`], [`CellAddress`], [`CellRange`] - 1-based addressing
//! - [`RawAnchor`] / [`Anchor`] - where an image is attached to the grid
//! - [`locate`] / [`RowBuckets`] - grouping images by row under a column tolerance
//! - [`sanitize_filename`] / [`unique_path`] - output naming without overwrites
//! - [`run_capture`] - blank-capture detection with bounded retries
//!
//! ## Example
//!
//! ```rust
//! use rowpix_core::{locate, Anchor, LocateParams};
//!
//! let images = vec![
//!     (Some(Anchor::new(2, 1)), "logo"),
//!     (Some(Anchor::new(2, 9)), "far away"),
//!     (None, "unreadable"),
//! ];
//! let buckets = locate(images, LocateParams { start_row: 1, target_col: Some(1), col_tolerance: 2 });
//!
//! assert_eq!(buckets.get(2), &["logo"]);
//! assert_eq!(buckets.dropped(), 1);
//! ```

pub mod address;
pub mod anchor;
pub mod bucket;
pub mod capture;
pub mod error;
pub mod naming;

pub use address::{column_letters, letters_to_column, CellAddress, CellRange, ColumnRef};
pub use anchor::{Anchor, AnchorMarker, RawAnchor};
pub use bucket::{locate, LocateParams, RowBuckets};
pub use capture::{
    file_size, is_blank_capture, run_capture, Appearance, CaptureOutcome, CapturePolicy,
    CaptureState,
};
pub use error::{Error, Result};
pub use naming::{sanitize_filename, unique_path};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;
