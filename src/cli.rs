use std::path::PathBuf;

use clap::Parser;

use crate::request::{ArticleLength, ArticleRequest, ArticleStyle, ArticleTone};

#[derive(Parser, Debug)]
#[command(name = "article-stream")]
#[command(version)]
#[command(about = "Generate articles from a local LLM service, optionally streaming them live")]
pub struct Args {
    /// Article topic (at least 10 characters)
    #[arg(required_unless_present_any = ["health", "models"])]
    pub topic: Option<String>,

    /// Target article length
    #[arg(long, value_enum, default_value = "medium")]
    pub length: ArticleLength,

    /// Writing style
    #[arg(long, value_enum, default_value = "informative")]
    pub style: ArticleStyle,

    /// Tone of voice
    #[arg(long, value_enum, default_value = "neutral")]
    pub tone: ArticleTone,

    /// Stream the article as it is generated
    #[arg(long, short)]
    pub stream: bool,

    /// Print rendered HTML instead of plain text
    #[arg(long)]
    pub html: bool,

    /// Check service health and exit
    #[arg(long)]
    pub health: bool,

    /// List models available to the service and exit
    #[arg(long)]
    pub models: bool,

    /// Service base URL (overrides config file and ARTICLE_API_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Request built from the topic and option flags. `None` when no topic
    /// was given (health/models mode).
    pub fn request(&self) -> Option<ArticleRequest> {
        self.topic.as_ref().map(|topic| {
            ArticleRequest::new(topic.clone())
                .length(self.length)
                .style(self.style)
                .tone(self.tone)
        })
    }
}
