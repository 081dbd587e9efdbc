//! Insight synthesis.
//!
//! Builds the scoring prompt, calls the generative backend and parses its
//! reply exactly once into a [`SynthesisResponse`]. Replies that are not the
//! requested JSON object become [`SynthesisResponse::Unstructured`], which
//! scores 0 and keeps the raw text as the explanation.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use vscope_ml_client::{MlError, TextGenerator};
use vscope_models::{MusicMatch, ViralityScore};

use crate::retry::{retry_async, with_timeout, RetryConfig, RetryResult};
use crate::stage::StageOutcome;

/// Explanation used when the generative backend never answered.
pub const SYNTHESIS_UNAVAILABLE: &str =
    "Insight synthesis unavailable: the language model could not be reached.";

/// Signals the prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub transcript: &'a str,
    pub music: &'a MusicMatch,
    pub representative_action: &'a str,
    pub frame_count: u32,
    pub filename: &'a str,
}

/// Build the scoring prompt.
pub fn build_prompt(input: &SynthesisInput<'_>) -> String {
    let transcript = if input.transcript.trim().is_empty() {
        "(no speech detected)"
    } else {
        input.transcript
    };

    format!(
        r#"You are an expert in short-form social video. Estimate how likely this video is to go viral.

Video signals:
- Filename: {filename}
- Dominant visual content: {action} (from {frames} sampled frames)
- Background music: {music}
- Transcript:
{transcript}

Return ONLY a single JSON object with this schema and nothing else:
{{
  "score": <integer from 0 to 100>,
  "explanation": "<two to four sentences explaining the score>"
}}
"#,
        filename = input.filename,
        action = input.representative_action,
        frames = input.frame_count,
        music = input.music.describe(),
        transcript = transcript,
    )
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Parsed generative backend reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisResponse {
    Structured {
        score: ViralityScore,
        explanation: String,
    },
    Unstructured {
        raw_text: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    score: Value,
    explanation: String,
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15).then_some(f as i64)
}

/// Accept integral numbers and integral numeric strings only.
fn integral_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn parse_insight(candidate: &str) -> Option<(ViralityScore, String)> {
    let raw: RawInsight = serde_json::from_str(candidate).ok()?;
    let score = ViralityScore::new(integral_score(&raw.score)?).ok()?;
    Some((score, raw.explanation))
}

impl SynthesisResponse {
    /// Parse a raw reply. Never fails: anything unusable is `Unstructured`.
    pub fn parse(raw: &str) -> Self {
        let stripped = strip_code_fences(raw);

        let parsed = parse_insight(stripped).or_else(|| {
            let start = stripped.find('{')?;
            let end = stripped.rfind('}')?;
            (start < end)
                .then(|| parse_insight(&stripped[start..=end]))
                .flatten()
        });

        match parsed {
            Some((score, explanation)) => Self::Structured { score, explanation },
            None => Self::Unstructured {
                raw_text: raw.to_string(),
            },
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }

    pub fn score(&self) -> ViralityScore {
        match self {
            Self::Structured { score, .. } => *score,
            Self::Unstructured { .. } => ViralityScore::FALLBACK,
        }
    }

    pub fn into_parts(self) -> (ViralityScore, String) {
        match self {
            Self::Structured { score, explanation } => (score, explanation),
            Self::Unstructured { raw_text } => (ViralityScore::FALLBACK, raw_text),
        }
    }
}

/// Calls the generative backend and resolves its reply.
pub struct InsightSynthesizer {
    backend: Arc<dyn TextGenerator>,
    timeout: Duration,
    retry: RetryConfig,
}

impl InsightSynthesizer {
    pub fn new(backend: Arc<dyn TextGenerator>, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            backend,
            timeout,
            retry: RetryConfig::new("synthesis")
                .with_max_retries(1)
                .with_base_delay(retry_delay),
        }
    }

    pub async fn synthesize(&self, input: &SynthesisInput<'_>) -> StageOutcome<SynthesisResponse> {
        let prompt = build_prompt(input);

        let result = retry_async(
            &self.retry,
            || with_timeout(self.timeout, self.backend.complete(&prompt)),
            |e: &MlError| e.is_timeout() || e.is_retryable(),
        )
        .await;

        match result {
            RetryResult::Success(raw) => match SynthesisResponse::parse(&raw) {
                response @ SynthesisResponse::Structured { .. } => StageOutcome::Ok(response),
                response => StageOutcome::degraded(response, "reply was not a valid score object"),
            },
            RetryResult::Failed { error, attempts } => StageOutcome::degraded(
                SynthesisResponse::Unstructured {
                    raw_text: SYNTHESIS_UNAVAILABLE.to_string(),
                },
                format!(
                    "{} completion failed after {} attempt(s): {}",
                    self.backend.name(),
                    attempts,
                    error
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use vscope_ml_client::MlResult;
    use vscope_models::TrackMatch;

    fn structured(score: i64, explanation: &str) -> SynthesisResponse {
        SynthesisResponse::Structured {
            score: ViralityScore::new(score).unwrap(),
            explanation: explanation.to_string(),
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fences("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed = SynthesisResponse::parse(r#"{"score": 82, "explanation": "Strong hook."}"#);
        assert_eq!(parsed, structured(82, "Strong hook."));
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed =
            SynthesisResponse::parse("```json\n{\"score\": 40, \"explanation\": \"Slow.\"}\n```");
        assert_eq!(parsed, structured(40, "Slow."));
    }

    #[test]
    fn test_parse_embedded_object() {
        let parsed = SynthesisResponse::parse(
            "Sure! Here you go: {\"score\": \"65\", \"explanation\": \"Good music.\"} Hope it helps.",
        );
        assert_eq!(parsed, structured(65, "Good music."));
    }

    #[test]
    fn test_malformed_falls_back_to_raw_text() {
        let raw = "I think this video is pretty good, maybe 70/100.";
        let parsed = SynthesisResponse::parse(raw);
        assert!(!parsed.is_structured());
        assert_eq!(parsed.score().value(), 0);
        assert_eq!(parsed.into_parts(), (ViralityScore::FALLBACK, raw.to_string()));
    }

    #[test]
    fn test_out_of_range_or_fractional_score_is_unstructured() {
        for raw in [
            r#"{"score": 150, "explanation": "x"}"#,
            r#"{"score": -3, "explanation": "x"}"#,
            r#"{"score": 72.5, "explanation": "x"}"#,
            r#"{"score": "high", "explanation": "x"}"#,
            r#"{"score": 50}"#,
        ] {
            let parsed = SynthesisResponse::parse(raw);
            assert_eq!(
                parsed,
                SynthesisResponse::Unstructured {
                    raw_text: raw.to_string()
                },
                "{raw}"
            );
        }
    }

    #[test]
    fn test_integral_float_score_accepted() {
        assert_eq!(
            SynthesisResponse::parse(r#"{"score": 55.0, "explanation": "ok"}"#).score().value(),
            55
        );
    }

    #[test]
    fn test_prompt_contains_signals() {
        let music = MusicMatch::Matched(TrackMatch::new("Levitating", "Dua Lipa"));
        let prompt = build_prompt(&SynthesisInput {
            transcript: "",
            music: &music,
            representative_action: "a workout video",
            frame_count: 12,
            filename: "gym.mp4",
        });
        assert!(prompt.contains("gym.mp4"));
        assert!(prompt.contains("a workout video"));
        assert!(prompt.contains("12 sampled frames"));
        assert!(prompt.contains("\"Levitating\" by Dua Lipa"));
        assert!(prompt.contains("(no speech detected)"));

        let prompt = build_prompt(&SynthesisInput {
            transcript: "hi",
            music: &MusicMatch::NoMatch,
            representative_action: "unknown",
            frame_count: 0,
            filename: "x.mp4",
        });
        assert!(prompt.contains("Background music: none"));
    }

    struct FixedReply(Option<&'static str>);

    #[async_trait]
    impl TextGenerator for FixedReply {
        async fn complete(&self, _prompt: &str) -> MlResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| MlError::Config("no key".to_string()))
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn input() -> (MusicMatch, &'static str) {
        (MusicMatch::NoMatch, "clip.mp4")
    }

    #[tokio::test]
    async fn test_synthesize_malformed_reply_degrades() {
        let (music, filename) = input();
        let synth = InsightSynthesizer::new(
            Arc::new(FixedReply(Some("not json at all"))),
            Duration::from_secs(1),
            Duration::from_millis(1),
        );
        let outcome = synth
            .synthesize(&SynthesisInput {
                transcript: "",
                music: &music,
                representative_action: "unknown",
                frame_count: 0,
                filename,
            })
            .await;

        assert!(outcome.is_degraded());
        let (score, explanation) = outcome.into_value().unwrap().into_parts();
        assert_eq!(score.value(), 0);
        assert_eq!(explanation, "not json at all");
    }

    #[tokio::test]
    async fn test_synthesize_backend_failure_uses_placeholder() {
        let (music, filename) = input();
        let synth = InsightSynthesizer::new(
            Arc::new(FixedReply(None)),
            Duration::from_secs(1),
            Duration::from_millis(1),
        );
        let outcome = synth
            .synthesize(&SynthesisInput {
                transcript: "",
                music: &music,
                representative_action: "unknown",
                frame_count: 0,
                filename,
            })
            .await;

        let (score, explanation) = outcome.into_value().unwrap().into_parts();
        assert_eq!(score, ViralityScore::FALLBACK);
        assert_eq!(explanation, SYNTHESIS_UNAVAILABLE);
    }
}
