use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArticleError, Result};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
/// Config file picked up from the working directory when `--config` is absent.
pub const LOCAL_CONFIG_FILE: &str = "article-stream.toml";
pub const BASE_URL_ENV: &str = "ARTICLE_API_URL";

/// Where the article service lives and how long to wait for it.
///
/// Timeouts are whole seconds in the TOML file:
///
/// ```toml
/// base_url = "http://127.0.0.1:8000/api"
/// connect_timeout_secs = 10
/// health_timeout_secs = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            health_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Load from `path` if given, else from `./article-stream.toml` if it
    /// exists, else defaults; then apply the `ARTICLE_API_URL` override.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(LOCAL_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(LOCAL_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        if let Ok(v) = std::env::var(BASE_URL_ENV) {
            if !v.trim().is_empty() {
                cfg.base_url = v;
            }
        }

        cfg.base_url = normalize_base_url(&cfg.base_url);
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml(&s)
            .map_err(|e| ArticleError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let mut cfg: Config = toml::from_str(s).map_err(|e| ArticleError::Config(e.to_string()))?;
        cfg.base_url = normalize_base_url(&cfg.base_url);
        Ok(cfg)
    }

    /// Replace the base URL, e.g. from a command-line flag.
    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(url.as_ref());
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.base_url, "http://127.0.0.1:8000/api");
        assert_eq!(cfg.health_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_toml_partial() {
        let cfg = Config::from_toml("base_url = \"http://gen.local:9000/api/\"\n").expect("parse");
        assert_eq!(cfg.base_url, "http://gen.local:9000/api");
        assert_eq!(cfg.health_timeout_secs, 5);
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = Config::from_toml("health_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ArticleError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "base_url = \"http://10.0.0.2/api\"\nhealth_timeout_secs = 2").expect("write");
        let cfg = Config::from_file(file.path()).expect("load");
        assert_eq!(cfg.base_url, "http://10.0.0.2/api");
        assert_eq!(cfg.health_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_from_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ArticleError::Io(_)));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let cfg = Config::default().with_base_url("http://host/api///");
        assert_eq!(cfg.endpoint("health"), "http://host/api/health");
        assert_eq!(cfg.endpoint("/generate-article"), "http://host/api/generate-article");
    }
}
