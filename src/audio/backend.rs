//! Speech synthesis boundary
//!
//! A [`SpeechBackend`] turns a line of text into encoded audio. Provider
//! failures are folded into three classes; only the class decides what the
//! pipeline does next.

use std::time::Duration;

use thiserror::Error;

/// Synthesized speech ready to be played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyAudio {
    /// Encoded audio (wav, ogg or mp3); empty means silence
    pub bytes: Vec<u8>,
    /// How long the clip plays, when the backend knows
    pub duration_hint: Option<Duration>,
}

impl ReadyAudio {
    pub fn silence(duration: Duration) -> Self {
        Self {
            bytes: Vec::new(),
            duration_hint: Some(duration),
        }
    }
}

/// One utterance waiting for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTask {
    pub text: String,
    pub voice: String,
    /// Pipeline generation the task was submitted under
    pub generation: u64,
}

/// Failure of a synthesis call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("speech authentication failed: {0}")]
    Auth(String),
    #[error("speech quota exhausted: {0}")]
    Quota(String),
    #[error("speech request failed: {0}")]
    Network(String),
}

impl SynthesisError {
    /// Auth and quota failures will not go away by retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, SynthesisError::Auth(_) | SynthesisError::Quota(_))
    }

    /// Classify a provider error message by its wording
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needle: &str| lower.contains(needle);

        let auth = has("unauthorized")
            || has("forbidden")
            || has("invalid_api_key")
            || (has("api key") && has("invalid"))
            || has("401")
            || has("403")
            || has("reported as leaked");
        if auth {
            return SynthesisError::Auth(message.to_string());
        }

        let quota = has("quota")
            || has("insufficient")
            || has("payment")
            || has("402")
            || has("too many requests")
            || has("429");
        if quota {
            return SynthesisError::Quota(message.to_string());
        }

        SynthesisError::Network(message.to_string())
    }

    /// Text shown once to the player when speech gets switched off
    pub fn notice(&self) -> String {
        match self {
            SynthesisError::Auth(_) => {
                "Voices disabled: the speech service rejected the credentials.".to_string()
            }
            SynthesisError::Quota(_) => {
                "Voices disabled: the speech service quota is used up.".to_string()
            }
            SynthesisError::Network(reason) => format!("Voice unavailable: {reason}"),
        }
    }
}

/// Text-to-speech provider
pub trait SpeechBackend: Send + Sync {
    fn synthesize(&self, text: &str, voice: &str) -> Result<ReadyAudio, SynthesisError>;
}

/// Backend that "speaks" every line as silence of a plausible length
#[derive(Debug, Clone)]
pub struct SilenceBackend {
    per_char: Duration,
    max: Duration,
}

impl SilenceBackend {
    pub fn new(per_char: Duration, max: Duration) -> Self {
        Self { per_char, max }
    }
}

impl Default for SilenceBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(45), Duration::from_secs(6))
    }
}

impl SpeechBackend for SilenceBackend {
    fn synthesize(&self, text: &str, _voice: &str) -> Result<ReadyAudio, SynthesisError> {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        let duration = self.per_char.saturating_mul(chars).min(self.max);
        Ok(ReadyAudio::silence(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("401 Unauthorized", true, "auth")]
    #[case("HTTP 403 Forbidden", true, "auth")]
    #[case("error: invalid_api_key", true, "auth")]
    #[case("The API key is invalid", true, "auth")]
    #[case("Your API key was reported as leaked", true, "auth")]
    #[case("quota exceeded for this month", true, "quota")]
    #[case("insufficient credits", true, "quota")]
    #[case("402 Payment Required", true, "quota")]
    #[case("429 Too Many Requests", true, "quota")]
    #[case("connection reset by peer", false, "network")]
    #[case("timed out after 30s", false, "network")]
    fn test_classify(#[case] message: &str, #[case] fatal: bool, #[case] class: &str) {
        let err = SynthesisError::classify(message);
        assert_eq!(err.is_fatal(), fatal);
        let actual = match err {
            SynthesisError::Auth(_) => "auth",
            SynthesisError::Quota(_) => "quota",
            SynthesisError::Network(_) => "network",
        };
        assert_eq!(actual, class);
    }

    #[test]
    fn test_silence_duration_scales_and_caps() {
        let backend = SilenceBackend::new(Duration::from_millis(10), Duration::from_millis(100));
        let short = backend.synthesize("hello", "v1").unwrap();
        assert_eq!(short.duration_hint, Some(Duration::from_millis(50)));
        assert!(short.bytes.is_empty());

        let long = backend.synthesize(&"x".repeat(500), "v1").unwrap();
        assert_eq!(long.duration_hint, Some(Duration::from_millis(100)));
    }
}
