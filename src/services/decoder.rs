use std::io::{Cursor, ErrorKind};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

use crate::error::GlueError;
use crate::pcm::PcmBuffer;

/// Turns the raw bytes of one compressed clip into planar PCM.
pub trait Decoder: Send + Sync {
    /// `extension` is a format hint taken from the clip's file name.
    fn decode(&self, raw: Vec<u8>, extension: Option<&str>) -> Result<PcmBuffer, GlueError>;
}

/// Decoder backed by symphonia (MP3 plus the crate's default formats).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl Decoder for SymphoniaDecoder {
    fn decode(&self, raw: Vec<u8>, extension: Option<&str>) -> Result<PcmBuffer, GlueError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(raw)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| GlueError::Decode(format!("unrecognised format: {e}")))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| GlueError::Decode("no audio track found".into()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| GlueError::Decode(format!("unsupported codec: {e}")))?;

        let mut sample_rate = params.sample_rate;
        let mut channels: Vec<Vec<f32>> = params
            .channels
            .map(|layout| vec![Vec::new(); layout.count()])
            .unwrap_or_default();
        if let Some(frames) = params.n_frames {
            for ch in &mut channels {
                ch.reserve(frames as usize);
            }
        }

        let mut decoded_packets = 0usize;
        let mut skipped_packets = 0usize;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(GlueError::Decode(format!("read error: {e}"))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!("Skipping corrupt packet: {}", reason);
                    skipped_packets += 1;
                    continue;
                }
                Err(e) => return Err(GlueError::Decode(e.to_string())),
            };

            decoded_packets += 1;
            let spec = *decoded.spec();
            let count = spec.channels.count();
            if channels.is_empty() {
                channels = vec![Vec::new(); count];
            } else if channels.len() != count {
                return Err(GlueError::Decode(format!(
                    "channel count changed mid-stream ({} -> {count})",
                    channels.len()
                )));
            }
            sample_rate.get_or_insert(spec.rate);

            let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            interleaved.copy_interleaved_ref(decoded);
            for frame in interleaved.samples().chunks_exact(count) {
                for (out, &sample) in channels.iter_mut().zip(frame) {
                    out.push(sample);
                }
            }
        }

        check_packets(decoded_packets, skipped_packets, params.n_frames)?;
        let sample_rate =
            sample_rate.ok_or_else(|| GlueError::Decode("missing sample rate".into()))?;
        PcmBuffer::new(channels, sample_rate)
    }
}

/// A clip must yield at least one decoded packet, unless the container
/// itself declares zero frames.
fn check_packets(
    decoded: usize,
    skipped: usize,
    declared_frames: Option<u64>,
) -> Result<(), GlueError> {
    if decoded == 0 && (skipped > 0 || declared_frames != Some(0)) {
        return Err(GlueError::Decode(format!(
            "no decodable audio frames ({skipped} corrupt packet(s))"
        )));
    }
    Ok(())
}

/// Lower-cased extension of a display name, if it has one.
pub fn extension_hint(display_name: &str) -> Option<String> {
    let (stem, ext) = display_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
