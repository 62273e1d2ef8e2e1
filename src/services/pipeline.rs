use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::task;
use tracing::{info, warn};

use crate::error::GlueError;
use crate::pcm::{ClipRecord, PcmBuffer, StereoBuffer};
use crate::services::decoder::{extension_hint, Decoder};
use crate::utils::concat_pcm::concatenate;
use crate::utils::encode_wav::{encode_wav, MAX_FRAMES};
use crate::utils::normalize::normalize;
use crate::utils::timestamps::format_timestamps;

/// One clip as supplied by the caller.
#[derive(Debug, Clone)]
pub struct ClipInput {
    pub display_name: String,
    pub raw_bytes: Vec<u8>,
}

/// An ordered list of clips; order is the output order.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub clips: Vec<ClipInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Decoding,
    Merging,
    Encoding,
    Ready,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Decoding => "decoding",
            RunState::Merging => "merging",
            RunState::Encoding => "encoding",
            RunState::Ready => "ready",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a run stopped, where, and on which clip.
#[derive(Debug, thiserror::Error)]
pub struct RunFailure {
    /// The state the run was in when it failed.
    pub stage: RunState,
    pub clip: Option<String>,
    #[source]
    pub source: GlueError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.clip {
            Some(clip) => write!(f, "{} failed for \"{}\": {}", self.stage, clip, self.source),
            None => write!(f, "{}", self.source),
        }
    }
}

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub wav: Vec<u8>,
    pub timestamps: String,
    pub clips: Vec<ClipRecord>,
    pub upmixed: Vec<String>,
    pub sample_rate: u32,
    pub frame_count: usize,
    pub sample_rate_mismatches: Vec<String>,
}

impl RunArtifacts {
    pub fn upmix_notice(&self) -> Option<String> {
        if self.upmixed.is_empty() {
            return None;
        }
        Some(format!(
            "Note: The following tracks were mono and upmixed to stereo: {}",
            self.upmixed.join(", ")
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_clips: usize,
    pub reject_sample_rate_mismatch: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_clips: usize::MAX,
            reject_sample_rate_mismatch: false,
        }
    }
}

/// Tracks the current state and logs every transition.
struct Run {
    state: RunState,
}

impl Run {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        info!("Run state {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, clip: Option<&str>, source: GlueError) -> RunFailure {
        let failure = RunFailure {
            stage: self.state,
            clip: clip.map(str::to_owned),
            source,
        };
        warn!("Run failed: {}", failure);
        self.state = RunState::Failed;
        failure
    }
}

/// Decode → normalize → concatenate → encode.
#[derive(Clone)]
pub struct Pipeline {
    decoder: Arc<dyn Decoder>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(decoder: Arc<dyn Decoder>, options: PipelineOptions) -> Self {
        Self { decoder, options }
    }

    /// Runs one request end to end.
    ///
    /// Clips decode in parallel on the blocking pool but are consumed in
    /// input order, so the first failing clip in that order is reported.
    /// Nothing partial is returned on failure.
    pub async fn run(&self, request: RunRequest) -> Result<RunArtifacts, RunFailure> {
        let mut run = Run::new();

        if request.clips.is_empty() {
            return Err(run.fail(None, GlueError::EmptyInput));
        }
        if request.clips.len() > self.options.max_clips {
            return Err(run.fail(
                None,
                GlueError::TooManyClips {
                    count: request.clips.len(),
                    limit: self.options.max_clips,
                },
            ));
        }

        run.advance(RunState::Decoding);
        info!("Decoding {} clip(s)", request.clips.len());

        let mut names = Vec::with_capacity(request.clips.len());
        let mut tasks = Vec::with_capacity(request.clips.len());
        for (i, clip) in request.clips.into_iter().enumerate() {
            let decoder = Arc::clone(&self.decoder);
            let extension = extension_hint(&clip.display_name);
            let index = i + 1;
            names.push(clip.display_name);

            tasks.push(task::spawn_blocking(move || {
                info!("Clip #{}: decoding {} bytes", index, clip.raw_bytes.len());
                decoder.decode(clip.raw_bytes, extension.as_deref())
            }));
        }

        let mut decoded = Vec::with_capacity(tasks.len());
        for (name, result) in names.into_iter().zip(join_all(tasks).await) {
            match result {
                Ok(Ok(pcm)) => decoded.push((name, pcm)),
                Ok(Err(e)) => return Err(run.fail(Some(&name), e)),
                Err(join_err) => {
                    let e = GlueError::Decode(format!("decoder task aborted: {join_err}"));
                    return Err(run.fail(Some(&name), e));
                }
            }
        }

        // merging and encoding touch every sample; keep them off the async workers
        let options = self.options;
        match task::spawn_blocking(move || assemble(options, run, decoded)).await {
            Ok(result) => result,
            Err(join_err) => {
                let failure = RunFailure {
                    stage: RunState::Merging,
                    clip: None,
                    source: GlueError::Aborted(join_err.to_string()),
                };
                warn!("Run failed: {}", failure);
                Err(failure)
            }
        }
    }
}

/// Everything after decoding; synchronous and CPU-bound.
fn assemble(
    options: PipelineOptions,
    mut run: Run,
    decoded: Vec<(String, PcmBuffer)>,
) -> Result<RunArtifacts, RunFailure> {
    let expected_rate = decoded.first().map(|(_, pcm)| pcm.sample_rate());

    let mut clips = Vec::with_capacity(decoded.len());
    let mut buffers: Vec<StereoBuffer> = Vec::with_capacity(decoded.len());
    let mut upmixed = Vec::new();
    let mut mismatches = Vec::new();

    for (name, pcm) in decoded {
        if let Some(expected) = expected_rate.filter(|&rate| rate != pcm.sample_rate()) {
            let found = pcm.sample_rate();
            if options.reject_sample_rate_mismatch {
                return Err(run.fail(
                    Some(&name),
                    GlueError::SampleRateMismatch { expected, found },
                ));
            }
            warn!(
                "\"{}\" is {} Hz, run is {} Hz; it will play at the wrong speed",
                name, found, expected
            );
            mismatches.push(name.clone());
        }

        let normalized = normalize(pcm);
        let duration = normalized.buffer.duration_secs();
        if normalized.was_upmixed {
            info!("Upmixed mono clip \"{}\" to stereo", name);
            upmixed.push(name.clone());
        }

        clips.push(ClipRecord {
            display_name: name,
            start_seconds: 0.0,
            duration_seconds: duration,
            start_frame: 0,
            was_upmixed: normalized.was_upmixed,
        });
        buffers.push(normalized.buffer);
    }

    run.advance(RunState::Merging);
    let merged = match concatenate(buffers) {
        Ok(concatenated) => {
            for (clip, offset) in clips.iter_mut().zip(&concatenated.offsets) {
                clip.start_seconds = offset.start_seconds;
                clip.start_frame = offset.start_frame;
            }
            concatenated.merged
        }
        Err(e) => return Err(run.fail(None, e)),
    };
    let frame_count = merged.frame_count();
    let sample_rate = merged.sample_rate();
    info!(
        "Merged {} clip(s) into {} frames at {} Hz",
        clips.len(),
        frame_count,
        sample_rate
    );

    if frame_count > MAX_FRAMES {
        return Err(run.fail(None, GlueError::TooLarge { frames: frame_count }));
    }

    run.advance(RunState::Encoding);
    let wav = encode_wav(&merged);
    drop(merged);
    let timestamps = format_timestamps(&clips);

    run.advance(RunState::Ready);
    Ok(RunArtifacts {
        wav,
        timestamps,
        clips,
        upmixed,
        sample_rate,
        frame_count,
        sample_rate_mismatches: mismatches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::encode_wav::{WavHeader, HEADER_LEN};

    /// Reads "<channels>:<rate>:<frames>" from the clip bytes; "fail" errors.
    struct FakeDecoder;

    impl Decoder for FakeDecoder {
        fn decode(&self, raw: Vec<u8>, _extension: Option<&str>) -> Result<PcmBuffer, GlueError> {
            let text = String::from_utf8(raw).map_err(|e| GlueError::Decode(e.to_string()))?;
            if text == "fail" {
                return Err(GlueError::Decode("corrupt frame".into()));
            }
            let parts: Vec<usize> = text.split(':').map(|p| p.parse().unwrap()).collect();
            let (channels, rate, frames) = (parts[0], parts[1] as u32, parts[2]);
            let data = (0..channels)
                .map(|ch| vec![ch as f32 * 0.1; frames])
                .collect();
            PcmBuffer::new(data, rate)
        }
    }

    fn clip(name: &str, spec: &str) -> ClipInput {
        ClipInput {
            display_name: name.to_string(),
            raw_bytes: spec.as_bytes().to_vec(),
        }
    }

    fn pipeline(options: PipelineOptions) -> Pipeline {
        Pipeline::new(Arc::new(FakeDecoder), options)
    }

    #[tokio::test]
    async fn three_mono_clips() {
        let request = RunRequest {
            clips: vec![
                clip("01 - Intro.mp3", "1:44100:88200"),
                clip("02 - Middle.mp3", "1:44100:154350"),
                clip("03 - End.mp3", "1:44100:55125"),
            ],
        };

        let out = pipeline(PipelineOptions::default()).run(request).await.unwrap();

        assert_eq!(out.frame_count, 297675);
        assert_eq!(out.sample_rate, 44100);
        assert_eq!(out.wav.len(), HEADER_LEN + 4 * 297675);
        assert_eq!(
            out.timestamps,
            "00:00 - Intro\n00:02 - Middle\n00:05 - End"
        );
        assert_eq!(
            out.upmixed,
            vec!["01 - Intro.mp3", "02 - Middle.mp3", "03 - End.mp3"]
        );
        assert_eq!(out.clips[1].start_frame, 88200);
        assert_eq!(out.clips[2].start_seconds, 5.5);
        assert!(out
            .upmix_notice()
            .unwrap()
            .starts_with("Note: The following tracks were mono"));

        let header = WavHeader::parse(&out.wav).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.frame_count(), 297675);
    }

    #[tokio::test]
    async fn stereo_clips_are_not_reported() {
        let request = RunRequest {
            clips: vec![clip("a.mp3", "2:8000:10"), clip("b.mp3", "1:8000:5")],
        };

        let out = pipeline(PipelineOptions::default()).run(request).await.unwrap();

        assert_eq!(out.upmixed, vec!["b.mp3"]);
        assert!(!out.clips[0].was_upmixed);
        assert!(out.clips[1].was_upmixed);
    }

    #[tokio::test]
    async fn empty_request_fails_before_decoding() {
        let failure = pipeline(PipelineOptions::default())
            .run(RunRequest::default())
            .await
            .unwrap_err();

        assert_eq!(failure.stage, RunState::Idle);
        assert!(failure.clip.is_none());
        assert!(matches!(failure.source, GlueError::EmptyInput));
        assert_eq!(failure.to_string(), "No audio to compile.");
    }

    #[tokio::test]
    async fn decode_failure_names_the_first_bad_clip() {
        let request = RunRequest {
            clips: vec![
                clip("good.mp3", "2:44100:10"),
                clip("broken.mp3", "fail"),
                clip("also-broken.mp3", "fail"),
            ],
        };

        let failure = pipeline(PipelineOptions::default())
            .run(request)
            .await
            .unwrap_err();

        assert_eq!(failure.stage, RunState::Decoding);
        assert_eq!(failure.clip.as_deref(), Some("broken.mp3"));
        assert!(failure.to_string().contains("broken.mp3"));
        assert!(failure.to_string().contains("corrupt frame"));
    }

    #[tokio::test]
    async fn zero_channel_clip_is_unsupported() {
        let request = RunRequest {
            clips: vec![clip("silent.mp3", "0:44100:0")],
        };

        let failure = pipeline(PipelineOptions::default())
            .run(request)
            .await
            .unwrap_err();

        assert!(matches!(
            failure.source,
            GlueError::UnsupportedChannelLayout { channels: 0 }
        ));
    }

    #[tokio::test]
    async fn rate_mismatch_is_reported_by_default() {
        let request = RunRequest {
            clips: vec![clip("a.mp3", "2:44100:44100"), clip("b.mp3", "2:48000:48000")],
        };

        let out = pipeline(PipelineOptions::default()).run(request).await.unwrap();

        assert_eq!(out.sample_rate, 44100);
        assert_eq!(out.frame_count, 92100);
        assert_eq!(out.sample_rate_mismatches, vec!["b.mp3"]);
        assert_eq!(out.clips[1].start_seconds, 1.0);
        assert_eq!(out.clips[1].start_frame, 44100);
        assert_eq!(out.timestamps, "00:00 - a\n00:01 - b");
    }

    #[tokio::test]
    async fn rate_mismatch_can_be_rejected() {
        let options = PipelineOptions {
            reject_sample_rate_mismatch: true,
            ..PipelineOptions::default()
        };
        let request = RunRequest {
            clips: vec![clip("a.mp3", "2:44100:10"), clip("b.mp3", "2:48000:10")],
        };

        let failure = pipeline(options).run(request).await.unwrap_err();

        assert_eq!(failure.stage, RunState::Decoding);
        assert_eq!(failure.clip.as_deref(), Some("b.mp3"));
        assert!(matches!(
            failure.source,
            GlueError::SampleRateMismatch {
                expected: 44100,
                found: 48000
            }
        ));
    }

    #[test]
    fn merging_needs_no_runtime() {
        let decoded = vec![
            ("a.mp3".to_string(), PcmBuffer::new(vec![vec![0.0; 8000]; 2], 8000).unwrap()),
            ("b.mp3".to_string(), PcmBuffer::new(vec![vec![0.0; 4000]], 8000).unwrap()),
            ("c.mp3".to_string(), PcmBuffer::new(vec![vec![0.0; 2]; 2], 8000).unwrap()),
        ];

        let out = assemble(PipelineOptions::default(), Run::new(), decoded).unwrap();

        assert_eq!(out.frame_count, 12002);
        let starts: Vec<(usize, f64)> = out
            .clips
            .iter()
            .map(|c| (c.start_frame, c.start_seconds))
            .collect();
        assert_eq!(starts, vec![(0, 0.0), (8000, 1.0), (12000, 1.5)]);
        assert_eq!(out.timestamps, "00:00 - a\n00:01 - b\n00:01 - c");
    }

    #[tokio::test]
    async fn clip_limit_is_enforced() {
        let options = PipelineOptions {
            max_clips: 1,
            ..PipelineOptions::default()
        };
        let request = RunRequest {
            clips: vec![clip("a.mp3", "2:8000:1"), clip("b.mp3", "2:8000:1")],
        };

        let failure = pipeline(options).run(request).await.unwrap_err();

        assert!(matches!(
            failure.source,
            GlueError::TooManyClips { count: 2, limit: 1 }
        ));
    }
}
