use std::path::PathBuf;
use std::str::FromStr;

use crate::error::GlueError;

/// Runtime settings, read from shuttle secrets (or any key/value lookup).
#[derive(Debug, Clone, PartialEq)]
pub struct GlueConfig {
    /// Directory runs are written under; also served at `/user_files`.
    pub output_root: PathBuf,
    pub wav_file_name: String,
    pub timestamps_file_name: String,
    pub max_clips: usize,
    /// JSON body limit for `POST /api/glue` (base64 inflates clips by ~4/3).
    pub max_payload_bytes: usize,
    pub reject_sample_rate_mismatch: bool,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./user_files"),
            wav_file_name: "mp3-glue.wav".to_string(),
            timestamps_file_name: "timestamps.txt".to_string(),
            max_clips: 500,
            max_payload_bytes: 512 * 1024 * 1024,
            reject_sample_rate_mismatch: false,
        }
    }
}

impl GlueConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GlueError> {
        let defaults = Self::default();

        let config = Self {
            output_root: lookup("GLUE_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_root),
            wav_file_name: file_name(&lookup, "GLUE_WAV_FILE_NAME")?
                .unwrap_or(defaults.wav_file_name),
            timestamps_file_name: file_name(&lookup, "GLUE_TIMESTAMPS_FILE_NAME")?
                .unwrap_or(defaults.timestamps_file_name),
            max_clips: parsed(&lookup, "GLUE_MAX_CLIPS")?.unwrap_or(defaults.max_clips),
            max_payload_bytes: parsed(&lookup, "GLUE_MAX_PAYLOAD_BYTES")?
                .unwrap_or(defaults.max_payload_bytes),
            reject_sample_rate_mismatch: parsed(&lookup, "GLUE_REJECT_SAMPLE_RATE_MISMATCH")?
                .unwrap_or(defaults.reject_sample_rate_mismatch),
        };

        if config.max_clips == 0 {
            return Err(GlueError::Config("GLUE_MAX_CLIPS must be at least 1".into()));
        }
        if config.wav_file_name == config.timestamps_file_name {
            return Err(GlueError::Config(
                "WAV and timestamp file names must differ".into(),
            ));
        }
        Ok(config)
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, GlueError> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| GlueError::Config(format!("{key} has an invalid value: {raw:?}")))
        })
        .transpose()
}

fn file_name(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<String>, GlueError> {
    match lookup(key) {
        Some(name) if name.is_empty() || name.contains(['/', '\\']) || name == ".." => Err(
            GlueError::Config(format!("{key} must be a plain file name, got {name:?}")),
        ),
        other => Ok(other),
    }
}
