use crate::pcm::StereoBuffer;

pub const HEADER_LEN: usize = 44;
const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Largest frame count whose RIFF size (`36 + data`) still fits a `u32`.
pub const MAX_FRAMES: usize = ((u32::MAX - 36) / BLOCK_ALIGN as u32) as usize;

/// Converts one float sample to 16-bit PCM.
///
/// Negative values scale by 32768 and positive ones by 32767, so both
/// -1.0 and 1.0 hit the ends of the `i16` range. NaN maps to 0.
pub fn sample_to_i16(sample: f32) -> i16 {
    // f64 holds every f32 × 32768 product exactly
    let s = f64::from(sample).clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Encode a stereo buffer as a canonical 44-byte-header WAV
/// (PCM, 2 channels, 16-bit, little-endian, interleaved left/right).
///
/// The buffer must hold at most [`MAX_FRAMES`] frames.
pub fn encode_wav(buf: &StereoBuffer) -> Vec<u8> {
    let frames = buf.frame_count();
    let sample_rate = buf.sample_rate();
    // the field is 32 bits wide; absurd rates wrap instead of panicking
    let byte_rate = sample_rate.wrapping_mul(u32::from(BLOCK_ALIGN));
    let data_size = (frames * BLOCK_ALIGN as usize) as u32;
    let file_size = 36 + data_size;

    let mut out = Vec::with_capacity(HEADER_LEN + data_size as usize);

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt sub-chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data sub-chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    for (&l, &r) in buf.left().iter().zip(buf.right()) {
        out.extend_from_slice(&sample_to_i16(l).to_le_bytes());
        out.extend_from_slice(&sample_to_i16(r).to_le_bytes());
    }

    out
}

/// Fields read back from a canonical 44-byte WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Returns `None` unless `bytes` starts with the exact layout
    /// [`encode_wav`] writes.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        if read_u32(bytes, 16) != 16 || read_u16(bytes, 20) != 1 {
            return None;
        }

        let header = Self {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bits_per_sample: read_u16(bytes, 34),
            data_len: read_u32(bytes, 40),
        };
        if header.channels == 0 || header.bits_per_sample == 0 || header.sample_rate == 0 {
            return None;
        }
        Some(header)
    }

    pub fn block_align(&self) -> u32 {
        u32::from(self.channels) * u32::from(self.bits_per_sample) / 8
    }

    pub fn frame_count(&self) -> u32 {
        self.data_len / self.block_align().max(1)
    }

    pub fn duration_secs(&self) -> f64 {
        f64::from(self.frame_count()) / f64::from(self.sample_rate)
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
