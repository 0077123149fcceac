//! Deployment configuration loaded from TOML files
//!
//! Every section is optional; omitted values fall back to the defaults the
//! assistant ships with:
//! - Assistant identity and persona file
//! - Completion provider settings
//! - Generation parameters and safety thresholds
//! - Speech output parameters
//! - History window used for prompts
//! - Redirect message pool
//! - Session retention limits

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Assistant identity
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// LLM provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Sampling parameters sent with every request
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Content-safety thresholds sent with every request
    #[serde(default)]
    pub safety: SafetySettings,

    /// Speech synthesis parameters
    #[serde(default)]
    pub speech: SpeechSettings,

    /// Prompt history window
    #[serde(default)]
    pub history: HistorySettings,

    /// Off-topic redirect pool
    #[serde(default)]
    pub redirects: RedirectsConfig,

    /// Transient notification behaviour
    #[serde(default)]
    pub notifications: NotificationSettings,

    /// In-memory session retention
    #[serde(default)]
    pub sessions: SessionSettings,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the completion or speech APIs would refuse
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(ConfigError::Validation(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                g.temperature
            )));
        }
        if !(0.0..=1.0).contains(&g.top_p) {
            return Err(ConfigError::Validation(format!(
                "generation.top_p must be within 0.0..=1.0, got {}",
                g.top_p
            )));
        }
        if g.max_output_tokens == 0 {
            return Err(ConfigError::Validation(
                "generation.max_output_tokens must be positive".to_string(),
            ));
        }

        let s = &self.speech;
        if !(0.1..=10.0).contains(&s.rate) || !(0.0..=2.0).contains(&s.pitch) {
            return Err(ConfigError::Validation(
                "speech.rate must be within 0.1..=10.0 and speech.pitch within 0.0..=2.0"
                    .to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&s.volume) {
            return Err(ConfigError::Validation(format!(
                "speech.volume must be within 0.0..=1.0, got {}",
                s.volume
            )));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::Validation(
                "sessions.max_sessions must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Assistant identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Display name used in the persona prompt
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Optional persona template (TOML) replacing the built-in one
    #[serde(default)]
    pub persona_file: Option<PathBuf>,
}

fn default_assistant_name() -> String {
    "MindEase".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            persona_file: None,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name, currently only "gemini"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API key environment variable name
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Custom API endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_k() -> u32 {
    40
}

fn default_top_p() -> f32 {
    0.95
}

fn default_max_output_tokens() -> u32 {
    1024
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Safety thresholds applied to every category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySettings {
    /// Threshold name, e.g. "BLOCK_MEDIUM_AND_ABOVE"
    #[serde(default = "default_threshold")]
    pub threshold: String,

    /// Harm categories the threshold applies to
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

fn default_threshold() -> String {
    "BLOCK_MEDIUM_AND_ABOVE".to_string()
}

fn default_categories() -> Vec<String> {
    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            categories: default_categories(),
        }
    }
}

/// Speech output parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default = "default_one")]
    pub rate: f32,

    #[serde(default = "default_one")]
    pub pitch: f32,

    #[serde(default = "default_one")]
    pub volume: f32,

    /// Preferred voice name, if the synthesizer offers it
    #[serde(default)]
    pub voice: Option<String>,
}

fn default_one() -> f32 {
    1.0
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

/// How much history goes into each prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Number of trailing exchanges included
    #[serde(default = "default_prompt_exchanges")]
    pub prompt_exchanges: usize,

    /// Assistant replies are cut to this many characters
    #[serde(default = "default_reply_excerpt_chars")]
    pub reply_excerpt_chars: usize,
}

fn default_prompt_exchanges() -> usize {
    2
}

fn default_reply_excerpt_chars() -> usize {
    100
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            prompt_exchanges: default_prompt_exchanges(),
            reply_excerpt_chars: default_reply_excerpt_chars(),
        }
    }
}

/// Custom redirect pool; empty means the built-in messages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectsConfig {
    #[serde(default)]
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Milliseconds before a notification dismisses itself
    #[serde(default = "default_dismiss_after_ms")]
    pub dismiss_after_ms: u64,
}

fn default_dismiss_after_ms() -> u64 {
    4000
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            dismiss_after_ms: default_dismiss_after_ms(),
        }
    }
}

/// Limits on chat sessions held in memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Least recently used sessions are evicted past this count
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions untouched this long are dropped
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_sessions() -> usize {
    1000
}

fn default_idle_timeout_secs() -> u64 {
    60 * 60
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[assistant]
name = "Sage"
persona_file = "configs/prompts/sage.toml"

[llm]
provider = "gemini"
model = "gemini-1.5-pro"
timeout_secs = 15

[generation]
temperature = 0.4
max_output_tokens = 512

[safety]
threshold = "BLOCK_LOW_AND_ABOVE"

[speech]
rate = 0.9
voice = "Samantha"

[history]
prompt_exchanges = 3

[redirects]
messages = ["Let's talk about you.", "How are you feeling?"]
"#;

    #[test]
    fn test_parse_config() {
        let config = ClientConfig::from_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.assistant.name, "Sage");
        assert_eq!(
            config.assistant.persona_file,
            Some(PathBuf::from("configs/prompts/sage.toml"))
        );
        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.llm.api_key_env, "GEMINI_API_KEY");

        assert_eq!(config.generation.temperature, 0.4);
        assert_eq!(config.generation.top_k, 40);
        assert_eq!(config.generation.max_output_tokens, 512);

        assert_eq!(config.safety.threshold, "BLOCK_LOW_AND_ABOVE");
        assert_eq!(config.safety.categories.len(), 4);

        assert_eq!(config.speech.rate, 0.9);
        assert_eq!(config.speech.volume, 1.0);
        assert_eq!(config.speech.voice.as_deref(), Some("Samantha"));

        assert_eq!(config.history.prompt_exchanges, 3);
        assert_eq!(config.history.reply_excerpt_chars, 100);
        assert_eq!(config.redirects.messages.len(), 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ClientConfig::from_str("").unwrap();
        assert_eq!(config.assistant.name, "MindEase");
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.safety.threshold, "BLOCK_MEDIUM_AND_ABOVE");
        assert_eq!(config.history.prompt_exchanges, 2);
        assert!(config.redirects.messages.is_empty());
        assert_eq!(config.notifications.dismiss_after_ms, 4000);
        assert_eq!(config.sessions.max_sessions, 1000);
        assert_eq!(config.sessions.idle_timeout_secs, 3600);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = ClientConfig::from_str("[generation]\ntemperature = 3.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = ClientConfig::from_str("[speech]\nvolume = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        let err = ClientConfig::from_str("[sessions]\nmax_sessions = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = ClientConfig::from_str("[llm\nmodel = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
