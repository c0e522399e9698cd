//! Request/response calls against the article service.
//!
//! Streaming goes through [`crate::ingestor::StreamIngestor`]; this client
//! hands one out that shares its connection pool.

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ArticleError, Result};
use crate::ingestor::StreamIngestor;
use crate::request::{ArticleRequest, ArticleResponse, HealthStatus, ModelList};

pub const GENERATE_PATH: &str = "generate-article";
pub const STREAM_PATH: &str = "generate-article-stream";
pub const HEALTH_PATH: &str = "health";
pub const MODELS_PATH: &str = "models";

pub struct ArticleClient {
    client: Client,
    config: Config,
}

impl ArticleClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder().connect_timeout(config.connect_timeout()).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stream_endpoint(&self) -> String {
        self.config.endpoint(STREAM_PATH)
    }

    /// A stream ingestor sharing this client's connection pool.
    pub fn ingestor(&self) -> StreamIngestor {
        StreamIngestor::new(self.client.clone())
    }

    /// Generate a whole article in one request.
    pub async fn generate(&self, request: &ArticleRequest) -> Result<String> {
        request.validate()?;
        let url = self.config.endpoint(GENERATE_PATH);
        debug!(%url, topic = %request.topic.trim(), "generating article");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request.normalized())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ArticleError::Protocol { status, body });
        }

        let data: ArticleResponse = response.json().await?;
        match data {
            ArticleResponse { success: true, article: Some(article), .. } => Ok(article),
            ArticleResponse { error, .. } => Err(ArticleError::Application(
                error.unwrap_or_else(|| "Failed to generate article".to_string()),
            )),
        }
    }

    /// Probe the service. Never fails: any problem becomes an unhealthy
    /// status carrying the reason.
    pub async fn health(&self) -> HealthStatus {
        let url = self.config.endpoint(HEALTH_PATH);
        let result = self
            .client
            .get(&url)
            .timeout(self.config.health_timeout())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let response = match result {
            Ok(r) => r,
            Err(e) => return unhealthy_from(&e),
        };
        match response.json::<HealthStatus>().await {
            Ok(status) => status,
            Err(e) => unhealthy_from(&e),
        }
    }

    pub async fn models(&self) -> Result<ModelList> {
        let url = self.config.endpoint(MODELS_PATH);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ArticleError::Protocol { status, body });
        }
        Ok(response.json().await?)
    }
}

fn unhealthy_from(e: &reqwest::Error) -> HealthStatus {
    warn!(error = %e, "health check failed");
    if e.is_timeout() {
        HealthStatus::unhealthy("Connection timed out")
    } else {
        HealthStatus::unhealthy(format!("Connection failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_at(url: &str) -> ArticleClient {
        ArticleClient::new(Config::default().with_base_url(url)).expect("client")
    }

    #[test]
    fn test_stream_endpoint() {
        let c = client_at("http://127.0.0.1:8000/api/");
        assert_eq!(c.stream_endpoint(), "http://127.0.0.1:8000/api/generate-article-stream");
    }

    #[tokio::test]
    async fn test_generate_validates_before_sending() {
        // Port 9 (discard) is never contacted: validation fails first.
        let c = client_at("http://127.0.0.1:9/api");
        let err = c.generate(&ArticleRequest::new("tiny")).await.unwrap_err();
        assert!(matches!(err, ArticleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_health_unreachable_is_unhealthy() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let c = client_at(&format!("http://127.0.0.1:{port}/api"));
        let status = c.health().await;
        assert!(!status.is_healthy());
        assert_eq!(status.ollama_connected, Some(false));
        assert!(status.summary().starts_with("Connection failed: "));
    }
}
