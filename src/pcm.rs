use serde::Serialize;

use crate::error::GlueError;

/// Planar floating-point audio as produced by a decoder.
///
/// Holds one or more channels of equal length; samples are nominally in
/// `[-1, 1]` but are not clamped until encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, GlueError> {
        if channels.is_empty() {
            return Err(GlueError::UnsupportedChannelLayout { channels: 0 });
        }
        check_sample_rate(sample_rate)?;
        let frames = channels[0].len();
        if let Some((idx, ch)) = channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != frames)
        {
            return Err(GlueError::InvalidBuffer(format!(
                "channel {idx} has {} frames, channel 0 has {frames}",
                ch.len()
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

/// Exactly two channels of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
}

/// The single buffer a run concatenates every clip into.
pub type MergedBuffer = StereoBuffer;

impl StereoBuffer {
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self, GlueError> {
        check_sample_rate(sample_rate)?;
        if left.len() != right.len() {
            return Err(GlueError::InvalidBuffer(format!(
                "left has {} frames, right has {}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Caller guarantees equal lengths and a positive rate.
    pub(crate) fn from_matched(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        debug_assert_eq!(left.len(), right.len());
        Self {
            left,
            right,
            sample_rate,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.left.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }
}

fn check_sample_rate(sample_rate: u32) -> Result<(), GlueError> {
    if sample_rate == 0 {
        return Err(GlueError::InvalidBuffer("sample rate must be positive".into()));
    }
    Ok(())
}

/// Where one input clip landed in the merged output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipRecord {
    pub display_name: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub start_frame: usize,
    pub was_upmixed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_channels() {
        let err = PcmBuffer::new(vec![], 44100).unwrap_err();
        assert!(matches!(
            err,
            GlueError::UnsupportedChannelLayout { channels: 0 }
        ));
    }

    #[test]
    fn rejects_ragged_channels() {
        let err = PcmBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert!(matches!(err, GlueError::InvalidBuffer(_)));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(PcmBuffer::new(vec![vec![0.0]], 0).is_err());
        assert!(StereoBuffer::new(vec![], vec![], 0).is_err());
    }

    #[test]
    fn duration_follows_frames_and_rate() {
        let buf = PcmBuffer::new(vec![vec![0.0; 22050]], 44100).unwrap();
        assert_eq!(buf.frame_count(), 22050);
        assert_eq!(buf.channel_count(), 1);
        assert!((buf.duration_secs() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_stereo_buffer_is_valid() {
        let buf = StereoBuffer::new(vec![], vec![], 48000).unwrap();
        assert_eq!(buf.frame_count(), 0);
        assert_eq!(buf.duration_secs(), 0.0);
    }
}
