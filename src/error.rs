use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GlueError {
    #[error("No audio to compile.")]
    EmptyInput,

    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("unsupported channel layout ({channels} channels)")]
    UnsupportedChannelLayout { channels: usize },

    #[error("sample rate {found} Hz does not match the run's {expected} Hz")]
    SampleRateMismatch { expected: u32, found: u32 },

    #[error("invalid PCM buffer: {0}")]
    InvalidBuffer(String),

    #[error("merged audio is too long for a WAV container ({frames} frames)")]
    TooLarge { frames: usize },

    #[error("too many clips: {count} (limit {limit})")]
    TooManyClips { count: usize, limit: usize },

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("processing task aborted: {0}")]
    Aborted(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for GlueError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_message_matches_ui_text() {
        assert_eq!(GlueError::EmptyInput.to_string(), "No audio to compile.");
    }

    #[test]
    fn serializes_as_message() {
        let err = GlueError::SampleRateMismatch {
            expected: 44100,
            found: 48000,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            "\"sample rate 48000 Hz does not match the run's 44100 Hz\""
        );
    }
}
