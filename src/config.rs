use std::env;

use crate::error::ConfigError;

const DEFAULT_WEATHER_BASE_URL: &str = "https://api.weatherapi.com/v1";
const DEFAULT_WEATHER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful weather assistant. You answer weather \
questions conversationally, in two or three sentences, using only the weather data you are \
given. Do not invent weather data or make forecasts.";

const WEATHER_API_KEY_VAR: &str = "WEATHER_API_KEY";
const MODEL_API_KEY_VAR: &str = "MODEL_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    Groq,
    Gemini,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Groq => "llama-3.3-70b-versatile",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    /// Provider-specific variable consulted when `MODEL_API_KEY` is unset.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Tools,
    Plain,
    Pipeline,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Plain => "plain",
            Self::Pipeline => "pipeline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub weather_api_key: Option<String>,
    pub weather_base_url: String,
    pub weather_timeout_secs: u64,
    pub model_provider: ModelProvider,
    pub model_api_key: Option<String>,
    pub model: String,
    pub model_base_url: String,
    pub model_timeout_secs: u64,
    pub system_prompt: String,
    pub agent_mode: AgentMode,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let model_provider = parse_model_provider(get_var("MODEL_PROVIDER").as_deref());
        let model_api_key = non_blank(get_var(MODEL_API_KEY_VAR))
            .or_else(|| non_blank(get_var(model_provider.api_key_var())));

        Self {
            weather_api_key: non_blank(get_var(WEATHER_API_KEY_VAR)),
            weather_base_url: non_blank(get_var("WEATHER_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_WEATHER_BASE_URL.to_string()),
            weather_timeout_secs: parse_positive_u64(
                get_var("WEATHER_TIMEOUT_SECS").as_deref(),
                DEFAULT_WEATHER_TIMEOUT_SECS,
            ),
            model_provider,
            model_api_key,
            model: non_blank(get_var("MODEL"))
                .unwrap_or_else(|| model_provider.default_model().to_string()),
            model_base_url: non_blank(get_var("MODEL_BASE_URL"))
                .unwrap_or_else(|| model_provider.default_base_url().to_string()),
            model_timeout_secs: parse_positive_u64(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
                DEFAULT_MODEL_TIMEOUT_SECS,
            ),
            system_prompt: non_blank(get_var("SYSTEM_PROMPT"))
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            agent_mode: parse_agent_mode(get_var("AGENT_MODE").as_deref()),
        }
    }

    pub fn weather_api_key(&self) -> Result<&str, ConfigError> {
        self.weather_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential {
                var: WEATHER_API_KEY_VAR.to_string(),
                hint: "Get a free key at weatherapi.com and add it to your .env file.",
            })
    }

    pub fn model_api_key(&self) -> Result<&str, ConfigError> {
        self.model_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingCredential {
                var: format!(
                    "{} (or {})",
                    self.model_provider.api_key_var(),
                    MODEL_API_KEY_VAR
                ),
                hint: "Add your model provider API key to your .env file.",
            })
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_model_provider(raw: Option<&str>) -> ModelProvider {
    match raw.unwrap_or("openai").trim().to_ascii_lowercase().as_str() {
        "groq" => ModelProvider::Groq,
        "gemini" => ModelProvider::Gemini,
        _ => ModelProvider::OpenAi,
    }
}

fn parse_agent_mode(raw: Option<&str>) -> AgentMode {
    match raw.unwrap_or("tools").trim().to_ascii_lowercase().as_str() {
        "plain" => AgentMode::Plain,
        "pipeline" => AgentMode::Pipeline,
        _ => AgentMode::Tools,
    }
}

#[cfg(test)]
pub(crate) fn test_config(base_url: &str) -> Config {
    Config {
        weather_api_key: Some("weather-key".to_string()),
        weather_base_url: base_url.to_string(),
        weather_timeout_secs: 5,
        model_provider: ModelProvider::OpenAi,
        model_api_key: Some("model-key".to_string()),
        model: "test-model".to_string(),
        model_base_url: base_url.to_string(),
        model_timeout_secs: 5,
        system_prompt: "You answer weather questions conversationally.".to_string(),
        agent_mode: AgentMode::Tools,
    }
}
