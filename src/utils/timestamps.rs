use once_cell::sync::Lazy;
use regex::Regex;

use crate::pcm::ClipRecord;

static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\s*[-_.]?\s*").expect("valid track number regex"));

static AUDIO_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mp3|wav|flac|ogg|oga|m4a|aac)$").expect("valid extension regex")
});

/// Renders a cumulative offset as `MM:SS`.
///
/// Minutes are not wrapped into hours, so 3665 seconds is `61:05`.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Strips a leading track number ("03 - ", "7_", "12.") and a trailing
/// audio file extension from a clip's file name.
pub fn clean_display_name(name: &str) -> String {
    let without_number = TRACK_NUMBER_PREFIX.replace(name, "");
    AUDIO_EXTENSION.replace(&without_number, "").into_owned()
}

/// One `MM:SS - name` line per clip, newline-joined, no trailing newline.
pub fn format_timestamps(clips: &[ClipRecord]) -> String {
    clips
        .iter()
        .map(|clip| {
            format!(
                "{} - {}",
                format_timestamp(clip.start_seconds),
                clean_display_name(&clip.display_name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
