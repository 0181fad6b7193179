//! Blank-capture detection and the bounded retry loop around a render step.
//!
//! Rendering through the clipboard sometimes produces an empty bitmap. Such a
//! file is recognisably tiny, so it is deleted and the render is tried again,
//! alternating between screen and print appearance.

use std::fmt;
use std::fs;
use std::path::Path;

/// How the automation host draws a range or shape when copying it as a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Appearance {
    /// As shown on screen (`xlScreen`)
    Screen,
    /// As it would be printed (`xlPrinter`)
    Printer,
}

impl Appearance {
    pub const CYCLE: [Appearance; 2] = [Appearance::Screen, Appearance::Printer];
}

impl fmt::Display for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Appearance::Screen => f.write_str("screen"),
            Appearance::Printer => f.write_str("printer"),
        }
    }
}

/// Limits for [`run_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Files smaller than this are blank captures
    pub min_bytes: u64,
    /// Rounds of attempts; each round tries every appearance once
    pub retries: u32,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            min_bytes: 8 * 1024,
            retries: 3,
        }
    }
}

impl CapturePolicy {
    pub fn attempts(&self) -> CaptureAttempts {
        CaptureAttempts {
            rounds: self.retries,
            round: 1,
            next: 0,
        }
    }
}

/// Yields `(round, appearance)` pairs: every appearance once per round.
#[derive(Debug, Clone)]
pub struct CaptureAttempts {
    rounds: u32,
    round: u32,
    next: usize,
}

impl Iterator for CaptureAttempts {
    type Item = (u32, Appearance);

    fn next(&mut self) -> Option<Self::Item> {
        if self.round > self.rounds {
            return None;
        }
        let item = (self.round, Appearance::CYCLE[self.next]);
        self.next += 1;
        if self.next == Appearance::CYCLE.len() {
            self.next = 0;
            self.round += 1;
        }
        Some(item)
    }
}

/// State of a capture loop after a render step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// The render produced a file below the size threshold (already removed)
    BlankDetected { bytes: u64 },
    /// The render step itself failed
    Failed(String),
    /// A usable file was produced
    Success { bytes: u64 },
}

/// How a capture loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Success { renders: u32, bytes: u64 },
    Exhausted { renders: u32, last: Option<CaptureState> },
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Success { .. })
    }
}

/// Size of the file at `path`, or `None` when it is missing.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

/// Whether `path` is missing or smaller than `min_bytes`.
pub fn is_blank_capture(path: &Path, min_bytes: u64) -> bool {
    file_size(path).map_or(true, |len| len < min_bytes)
}

/// Render into `path` until a non-blank file appears or the policy runs out.
///
/// `render` is called with the appearance to use; it is expected to write
/// `path`. Blank results are deleted before the next attempt so no partial
/// file is left behind on exhaustion.
pub fn run_capture<F, E>(policy: &CapturePolicy, path: &Path, mut render: F) -> CaptureOutcome
where
    F: FnMut(Appearance) -> Result<(), E>,
    E: fmt::Display,
{
    let mut renders = 0;
    let mut last = None;

    for (round, appearance) in policy.attempts() {
        renders += 1;

        let state = match render(appearance) {
            Err(e) => CaptureState::Failed(e.to_string()),
            Ok(()) => match file_size(path) {
                Some(bytes) if bytes >= policy.min_bytes => CaptureState::Success { bytes },
                size => {
                    let _ = fs::remove_file(path);
                    CaptureState::BlankDetected {
                        bytes: size.unwrap_or(0),
                    }
                }
            },
        };

        match state {
            CaptureState::Success { bytes } => return CaptureOutcome::Success { renders, bytes },
            CaptureState::BlankDetected { bytes } => log::debug!(
                "blank capture ({bytes} bytes) -> retry (round={round}, appearance={appearance}, path={})",
                path.display()
            ),
            CaptureState::Failed(ref e) => log::debug!(
                "capture failed (round={round}, appearance={appearance}, path={}): {e}",
                path.display()
            ),
        }
        last = Some(state);
    }

    CaptureOutcome::Exhausted { renders, last }
}
