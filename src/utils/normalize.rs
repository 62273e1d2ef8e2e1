use tracing::warn;

use crate::pcm::{PcmBuffer, StereoBuffer};

/// A clip forced to stereo, plus whether that took an upmix.
#[derive(Debug)]
pub struct Normalized {
    pub buffer: StereoBuffer,
    pub was_upmixed: bool,
}

/// Maps any decoded buffer to exactly two channels.
///
/// Stereo passes through untouched. Mono is duplicated into both sides.
/// Anything wider keeps channel 0 as left and channel 1 as right and drops
/// the rest. Frame count and sample rate never change.
pub fn normalize(buf: PcmBuffer) -> Normalized {
    let sample_rate = buf.sample_rate();
    let source_channels = buf.channel_count();
    let mut channels = buf.into_channels().into_iter();

    // PcmBuffer guarantees at least one channel
    let left = channels.next().unwrap_or_default();
    let (right, was_upmixed) = match channels.next() {
        Some(right) => (right, false),
        None => (left.clone(), true),
    };

    if source_channels > 2 {
        warn!(
            "Dropping {} channel(s) beyond stereo",
            source_channels - 2
        );
    }

    Normalized {
        buffer: StereoBuffer::from_matched(left, right, sample_rate),
        was_upmixed,
    }
}
