use crate::types::{Fragment, Segment};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format a window's span as `[MM:SS–MM:SS]`
pub fn format_window(segment: &Segment) -> String {
    format!(
        "[{}–{}]",
        format_timestamp(segment.start_time),
        format_timestamp(segment.end_time)
    )
}

/// Format recognizer fragments with timestamps, one per line
pub fn format_fragments_with_timestamps(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| format!("[{}] {}", format_timestamp(f.start), f.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
