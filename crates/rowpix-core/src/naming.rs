//! Output file naming: sanitizing cell text and picking collision-free paths.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("valid regex"));

/// Highest numeric suffix tried by [`unique_path`] (exclusive).
pub const MAX_SUFFIX: u32 = 9999;

/// Turn cell text into a file-name stem.
///
/// Surrounding whitespace is trimmed, blank input falls back to `default`, and
/// each run of path-unsafe characters becomes a single `_`.
pub fn sanitize_filename(raw: Option<&str>, default: &str) -> String {
    let name = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

/// Pick a path in `dir` for `filename` that does not exist yet.
///
/// `photo.png` is tried first, then `photo_2.png`, `photo_3.png` and so on.
pub fn unique_path(dir: &Path, filename: &str) -> Result<PathBuf> {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let (stem, ext) = split_extension(filename);
    for n in 2..MAX_SUFFIX {
        let candidate = dir.join(format!("{stem}_{n}{ext}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::NamesExhausted(dir.join(filename)))
}

/// Split `name.ext` into (`name`, `.ext`). A leading dot is part of the stem.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if filename[..pos].trim_start_matches('.').len() > 0 => {
            (&filename[..pos], &filename[pos..])
        }
        _ => (filename, ""),
    }
}
