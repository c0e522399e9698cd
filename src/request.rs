use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of characters a topic needs after trimming.
pub const MIN_TOPIC_CHARS: usize = 10;

// -- Enumerated options -----------------------------------------------------

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleLength {
    Short,
    #[default]
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStyle {
    #[default]
    Informative,
    Creative,
    Technical,
    Casual,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleTone {
    #[default]
    Neutral,
    Professional,
    Friendly,
    Authoritative,
}

impl std::fmt::Display for ArticleLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArticleLength::Short => write!(f, "short"),
            ArticleLength::Medium => write!(f, "medium"),
            ArticleLength::Long => write!(f, "long"),
        }
    }
}

impl std::fmt::Display for ArticleStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArticleStyle::Informative => write!(f, "informative"),
            ArticleStyle::Creative => write!(f, "creative"),
            ArticleStyle::Technical => write!(f, "technical"),
            ArticleStyle::Casual => write!(f, "casual"),
        }
    }
}

impl std::fmt::Display for ArticleTone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArticleTone::Neutral => write!(f, "neutral"),
            ArticleTone::Professional => write!(f, "professional"),
            ArticleTone::Friendly => write!(f, "friendly"),
            ArticleTone::Authoritative => write!(f, "authoritative"),
        }
    }
}

// -- Request ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a topic for your article")]
    EmptyTopic,
    #[error("Please provide a more detailed topic (at least {min} characters, got {len})")]
    TopicTooShort { len: usize, min: usize },
}

/// Body posted to both the synchronous and the streaming generate endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRequest {
    pub topic: String,
    #[serde(default)]
    pub length: ArticleLength,
    #[serde(default)]
    pub style: ArticleStyle,
    #[serde(default)]
    pub tone: ArticleTone,
}

impl ArticleRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            length: ArticleLength::default(),
            style: ArticleStyle::default(),
            tone: ArticleTone::default(),
        }
    }

    pub fn length(mut self, length: ArticleLength) -> Self {
        self.length = length;
        self
    }

    pub fn style(mut self, style: ArticleStyle) -> Self {
        self.style = style;
        self
    }

    pub fn tone(mut self, tone: ArticleTone) -> Self {
        self.tone = tone;
        self
    }

    /// Check the topic the same way the form does before anything is sent.
    /// Length is measured in characters on the trimmed topic.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        let len = topic.chars().count();
        if len < MIN_TOPIC_CHARS {
            return Err(ValidationError::TopicTooShort { len, min: MIN_TOPIC_CHARS });
        }
        Ok(())
    }

    /// Copy with the topic trimmed, as it goes on the wire.
    pub fn normalized(&self) -> Self {
        Self { topic: self.topic.trim().to_string(), ..self.clone() }
    }
}

// -- Responses --------------------------------------------------------------

/// Reply of the synchronous generate endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply of the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            ollama_connected: Some(false),
            model: None,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    /// One-line status text for display.
    pub fn summary(&self) -> String {
        if self.is_healthy() {
            format!("Connected to {}", self.model.as_deref().unwrap_or("Ollama"))
        } else {
            self.error.clone().unwrap_or_else(|| "Ollama disconnected".to_string())
        }
    }
}

/// Reply of the model listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
