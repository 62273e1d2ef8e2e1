use crate::error::GlueError;
use crate::pcm::{MergedBuffer, StereoBuffer};

/// Start position of one input buffer inside the merged output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipOffset {
    pub start_frame: usize,
    pub start_seconds: f64,
}

#[derive(Debug)]
pub struct Concatenated {
    pub merged: MergedBuffer,
    pub offsets: Vec<ClipOffset>,
}

/// Sample-accurate concatenation:
/// Copies every buffer's left and right channels, in order, into one
/// pre-sized stereo buffer with no gap or overlap between clips.
///
/// The output takes the first buffer's sample rate. Later rates are not
/// checked here; callers decide whether a mismatch is an error.
pub fn concatenate(buffers: Vec<StereoBuffer>) -> Result<Concatenated, GlueError> {
    let sample_rate = buffers
        .first()
        .map(StereoBuffer::sample_rate)
        .ok_or(GlueError::EmptyInput)?;

    let total: usize = buffers.iter().map(StereoBuffer::frame_count).sum();
    let mut left = Vec::with_capacity(total);
    let mut right = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(buffers.len());
    let mut elapsed = 0.0;

    for buffer in buffers {
        offsets.push(ClipOffset {
            start_frame: left.len(),
            start_seconds: elapsed,
        });
        elapsed += buffer.duration_secs();

        left.extend_from_slice(buffer.left());
        right.extend_from_slice(buffer.right());
        // each input is freed as soon as it has been copied
    }

    Ok(Concatenated {
        merged: StereoBuffer::from_matched(left, right, sample_rate),
        offsets,
    })
}
