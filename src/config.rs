//! Environment-driven configuration

use crate::system_prompt::PromptContext;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant service root, e.g. `http://localhost:8000`.
    pub api_base_url: String,
    /// Signed-in user address, if any.
    pub user_email: Option<String>,
    /// Timeout for request/response calls.
    pub request_timeout: Duration,
    /// How many past turns to hydrate at startup.
    pub history_limit: usize,
    /// Student context folded into the system prompt.
    pub prompt: PromptContext,
}

impl Config {
    pub fn from_env() -> Self {
        let api_base_url =
            env_string("CAMPUS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let request_timeout = env_string("CAMPUS_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis);
        let history_limit = env_string("CAMPUS_HISTORY_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HISTORY_LIMIT);

        let prompt = PromptContext {
            campus: env_string("CAMPUS_NAME"),
            student_name: env_string("CAMPUS_STUDENT_NAME"),
            major: env_string("CAMPUS_MAJOR"),
            interests: env_string("CAMPUS_INTERESTS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        };

        Self {
            api_base_url,
            user_email: env_string("CAMPUS_USER_EMAIL"),
            request_timeout,
            history_limit,
            prompt,
        }
    }

    /// The streaming root derived from the API root (http → ws).
    pub fn stream_base_url(&self) -> String {
        if let Some(rest) = self.api_base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.api_base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.api_base_url.clone()
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_url(url: &str) -> Config {
        Config {
            api_base_url: url.to_string(),
            user_email: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            prompt: PromptContext::default(),
        }
    }

    #[test]
    fn stream_url_swaps_scheme() {
        assert_eq!(
            config_with_url("http://localhost:8000").stream_base_url(),
            "ws://localhost:8000"
        );
        assert_eq!(
            config_with_url("https://api.campus.example").stream_base_url(),
            "wss://api.campus.example"
        );
    }

    #[test]
    fn stream_url_passes_through_explicit_ws() {
        assert_eq!(
            config_with_url("ws://localhost:9000").stream_base_url(),
            "ws://localhost:9000"
        );
    }
}
