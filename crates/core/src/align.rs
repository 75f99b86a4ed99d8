//! Folding variable-length recognizer fragments into fixed-duration windows.

use crate::{
    error::{MediaQuizError, Result},
    types::{Fragment, Segment},
};

/// Five minutes.
pub const DEFAULT_WINDOW_SECONDS: f64 = 300.0;

#[derive(Debug, Clone, Copy)]
pub struct SegmentAligner {
    window: f64,
}

impl Default for SegmentAligner {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl SegmentAligner {
    pub fn new(window_seconds: f64) -> Result<Self> {
        if !window_seconds.is_finite() || window_seconds <= 0.0 {
            return Err(MediaQuizError::validation(format!(
                "window size must be a positive number of seconds, got {window_seconds}"
            )));
        }
        Ok(Self {
            window: window_seconds,
        })
    }

    pub fn window_seconds(&self) -> f64 {
        self.window
    }

    /// Group fragments by the window their `start` falls into.
    ///
    /// A window that collects no fragment ends the alignment, so a silent gap
    /// of at least one window drops everything after it.
    pub fn align(&self, fragments: &[Fragment]) -> Vec<Segment> {
        let Some(last) = fragments.last() else {
            return Vec::new();
        };
        let last_end = last.end;

        let mut windows = Vec::new();
        let mut window_start = 0.0;
        let mut window_index = 0u32;

        loop {
            let window_end = window_start + self.window;

            let texts: Vec<&str> = fragments
                .iter()
                .filter(|f| f.start >= window_start && f.start < window_end)
                .map(|f| f.text.as_str())
                .collect();

            if texts.is_empty() {
                break;
            }

            windows.push(Segment {
                start_time: window_start,
                end_time: window_end.min(last_end),
                text: texts.join(" "),
                segment_index: window_index,
            });

            window_start = window_end;
            window_index += 1;

            if window_start >= last_end {
                break;
            }
        }

        windows
    }
}

/// Duration of an aligned transcript: the end of its final window, or zero.
pub fn transcript_duration(segments: &[Segment]) -> f64 {
    segments.last().map(|s| s.end_time).unwrap_or(0.0)
}
