use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Remote API settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Reads `QUIZ_API_URL` and `QUIZ_API_TIMEOUT_SECS`, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("QUIZ_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.into());
        let timeout = env::var("QUIZ_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);
        Self { base_url, timeout }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins `path` onto the base URL with exactly one slash between them.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_slashes() {
        let cfg = ApiConfig::new("https://quiz.example/api/");
        assert_eq!(cfg.endpoint("/score/entry"), "https://quiz.example/api/score/entry");
        assert_eq!(cfg.endpoint("token/"), "https://quiz.example/api/token/");
    }

    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!(ApiConfig::default().timeout, Duration::from_secs(5));
    }
}
