//! AI game-host commentary: best-effort narration text and speech synthesis.
//!
//! Nothing in here is on the correctness-critical path. Every remote call is
//! bounded by a timeout, and every event has a deterministic canned fallback
//! line so the game always has narration even with no provider configured.

mod openai;
mod tts;

use crate::protocol::AudioClip;
use async_trait::async_trait;
use std::time::Duration;

pub use openai::OpenAiNarrator;
pub use tts::SpeechClient;

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur while talking to the narration or TTS backends
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// A named game event the host comments on.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Intro {
        player_name: String,
    },
    RoundStart {
        round_number: u32,
        category: String,
    },
    CorrectAnswer {
        player_name: String,
        answer: String,
    },
    IncorrectAnswer {
        player_name: String,
        guess: String,
    },
    /// Time ran out or nobody was left to buzz; the answer gets revealed.
    RoundComplete {
        answer: String,
    },
}

impl HostEvent {
    /// Instruction handed to the narrator for this event.
    fn prompt(&self) -> String {
        match self {
            HostEvent::Intro { player_name } => format!(
                "{} just joined. Greet the new player like you're meeting a friend. \
                 Be warm and welcoming, but keep it natural and conversational.",
                player_name
            ),
            HostEvent::RoundStart {
                round_number,
                category,
            } => format!(
                "It's round {} and the category is '{}'. Let the players know they can \
                 buzz in right away if they think they know it. Sound excited but natural!",
                round_number, category
            ),
            HostEvent::CorrectAnswer {
                player_name,
                answer,
            } => format!(
                "{} just got '{}' right! React naturally like you're genuinely excited \
                 for them. Be enthusiastic but sound like a real person talking to a friend.",
                player_name, answer
            ),
            HostEvent::IncorrectAnswer { player_name, guess } => format!(
                "{} guessed '{}' but that's not right. Be supportive and encouraging, \
                 like a friend would be. Keep the game going!",
                player_name, guess
            ),
            HostEvent::RoundComplete { answer } => format!(
                "Time's up! The answer was '{}'. React naturally to the time running \
                 out - maybe a little disappointed but ready to move on to the next round.",
                answer
            ),
        }
    }

    /// Canned line used when no narrator is configured or the call fails.
    fn fallback(&self) -> String {
        match self {
            HostEvent::Intro { .. } => {
                "Hey there! Welcome to the toss-up! Ready to solve some puzzles?".to_string()
            }
            HostEvent::RoundStart {
                round_number,
                category,
            } => format!(
                "Alright, round {}! Your category is {}. You can buzz in anytime - \
                 even just from the category alone!",
                round_number, category
            ),
            HostEvent::CorrectAnswer {
                player_name,
                answer,
            } => format!("Yes! Nice job {}, you got it - '{}'!", player_name, answer),
            HostEvent::IncorrectAnswer { player_name, guess } => format!(
                "Ooh, not quite {}! '{}' isn't it, but don't worry - keep trying!",
                player_name, guess
            ),
            HostEvent::RoundComplete { answer } => format!(
                "Aww, time's up! It was '{}' - but hey, let's keep going with the next round!",
                answer
            ),
        }
    }
}

/// Room snapshot passed along with an event so the narrator can react to it.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    pub round: u32,
    /// (name, score) pairs for everyone currently in the room.
    pub scores: Vec<(String, u32)>,
}

impl HostContext {
    fn render(&self) -> String {
        let scores: Vec<String> = self
            .scores
            .iter()
            .map(|(name, score)| format!("{}: {}", name, score))
            .collect();
        format!(
            "Game context: Round {}, Current scores: {{{}}}",
            self.round,
            scores.join(", ")
        )
    }
}

/// Request to generate a narration line
#[derive(Debug, Clone)]
pub struct NarrateRequest {
    /// Full prompt text (context plus event instruction)
    pub prompt: String,
    /// Maximum response length in tokens
    pub max_tokens: u32,
    /// Hard timeout for the request
    pub timeout: Duration,
}

/// Trait that narration backends implement
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Generate one line of host commentary
    async fn narrate(&self, request: NarrateRequest) -> HostResult<String>;

    /// Name of this backend, for logging
    fn name(&self) -> &str;
}

/// Configuration for the game host, read from the environment.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// API key for the OpenAI-compatible narration endpoint
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub tts: TtsConfig,
}

/// Speech synthesis settings (Higgs-Audio-style vLLM endpoint).
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub voice: String,
    pub timeout: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "llama3.2-3b".to_string(),
            base_url: "http://localhost:8000/v1".to_string(),
            timeout: Duration::from_secs(10),
            max_tokens: 150,
            tts: TtsConfig {
                enabled: false,
                model: "higgs-audio-v2-generation-3B-base".to_string(),
                base_url: "http://localhost:8000".to_string(),
                api_key: None,
                voice: "game_host".to_string(),
                timeout: Duration::from_secs(60),
            },
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl HostConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = env_nonempty("AI_API_KEY");
        let tts_api_key = env_nonempty("TTS_API_KEY").or_else(|| api_key.clone());

        Self {
            api_key,
            model: env_nonempty("AI_MODEL").unwrap_or(defaults.model),
            base_url: env_nonempty("AI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: env_nonempty("HOST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_tokens: env_nonempty("HOST_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            tts: TtsConfig {
                enabled: env_nonempty("TTS_ENABLED")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                model: env_nonempty("TTS_MODEL").unwrap_or(defaults.tts.model),
                base_url: env_nonempty("TTS_BASE_URL").unwrap_or(defaults.tts.base_url),
                api_key: tts_api_key,
                voice: env_nonempty("TTS_VOICE").unwrap_or(defaults.tts.voice),
                timeout: defaults.tts.timeout,
            },
        }
    }
}

/// The game host: narration with fallback, plus optional speech synthesis.
pub struct GameHost {
    narrator: Option<Box<dyn Narrator>>,
    speech: Option<SpeechClient>,
    timeout: Duration,
    max_tokens: u32,
}

impl GameHost {
    pub fn new(config: HostConfig) -> Self {
        let narrator: Option<Box<dyn Narrator>> = match &config.api_key {
            Some(api_key) => {
                tracing::info!(
                    "AI game host enabled with {} at {}",
                    config.model,
                    config.base_url
                );
                Some(Box::new(OpenAiNarrator::new(
                    api_key.clone(),
                    config.model.clone(),
                    config.base_url.clone(),
                )))
            }
            None => {
                tracing::info!("No AI_API_KEY set, using static game host");
                None
            }
        };

        let speech = if config.tts.enabled {
            tracing::info!(
                "TTS enabled with {} at {} (voice: {})",
                config.tts.model,
                config.tts.base_url,
                config.tts.voice
            );
            Some(SpeechClient::new(config.tts.clone()))
        } else {
            None
        };

        Self {
            narrator,
            speech,
            timeout: config.timeout,
            max_tokens: config.max_tokens,
        }
    }

    /// Host narrating through the given backend, with speech synthesis off.
    pub fn with_narrator(narrator: Box<dyn Narrator>) -> Self {
        Self {
            narrator: Some(narrator),
            speech: None,
            timeout: Duration::from_secs(10),
            max_tokens: 150,
        }
    }

    /// Host with no backends at all; narration comes from the canned lines.
    pub fn disabled() -> Self {
        Self {
            narrator: None,
            speech: None,
            timeout: Duration::from_secs(1),
            max_tokens: 150,
        }
    }

    /// Produce one line of narration for an event. Never fails: backend
    /// absence, errors and timeouts all degrade to the canned fallback.
    pub async fn narrate(&self, event: &HostEvent, context: Option<&HostContext>) -> String {
        let narrator = match &self.narrator {
            Some(n) => n,
            None => return event.fallback(),
        };

        let prompt = match context {
            Some(ctx) => format!("{}\n\n{}", ctx.render(), event.prompt()),
            None => event.prompt(),
        };

        let request = NarrateRequest {
            prompt,
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        };

        match narrator.narrate(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Narrator {} returned empty text", narrator.name());
                event.fallback()
            }
            Err(e) => {
                tracing::warn!("Narrator {} failed: {}", narrator.name(), e);
                event.fallback()
            }
        }
    }

    /// Best-effort speech synthesis for a narration line.
    pub async fn synthesize(&self, text: &str) -> Option<AudioClip> {
        let speech = self.speech.as_ref()?;
        match speech.synthesize(text).await {
            Ok(clip) => Some(clip),
            Err(e) => {
                tracing::warn!("Speech synthesis failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    async fn disabled_host_uses_fallback_lines() {
        let host = GameHost::disabled();
        let line = host
            .narrate(
                &HostEvent::RoundStart {
                    round_number: 2,
                    category: "PHRASE".to_string(),
                },
                None,
            )
            .await;
        assert_eq!(
            line,
            "Alright, round 2! Your category is PHRASE. You can buzz in anytime - \
             even just from the category alone!"
        );
        assert!(host.synthesize(&line).await.is_none());
    }

    #[test]
    #[serial]
    fn config_defaults_without_env() {
        std::env::remove_var("AI_API_KEY");
        std::env::remove_var("AI_MODEL");
        std::env::remove_var("TTS_ENABLED");

        let config = HostConfig::from_env();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, "llama3.2-3b");
        assert!(!config.tts.enabled);
    }

    #[test]
    #[serial]
    fn config_reads_env_overrides() {
        std::env::set_var("AI_API_KEY", "test-key");
        std::env::set_var("AI_MODEL", "some-model");
        std::env::set_var("TTS_ENABLED", "TRUE");

        let config = HostConfig::from_env();
        assert_eq!(config.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.model, "some-model");
        assert!(config.tts.enabled);
        // TTS key falls back to the narration key.
        assert_eq!(config.tts.api_key.as_deref(), Some("test-key"));

        std::env::remove_var("AI_API_KEY");
        std::env::remove_var("AI_MODEL");
        std::env::remove_var("TTS_ENABLED");
    }
}
