/// Gemini HTTP client implementation.
///
/// This module provides `GeminiClient` for making synchronous HTTP requests
/// to the Gemini `generateContent` API with Google Search grounding enabled,
/// along with error types and a builder for configuration.
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::types::GenerateContentResponse;

/// Default public endpoint of the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors that can occur when interacting with the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Gemini API-specific errors
    #[error("Gemini API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No API key was configured
    #[error("{}", crate::config::MISSING_API_KEY_MSG)]
    MissingApiKey,
}

/// Builder for constructing `GeminiClient` instances.
///
/// # Examples
///
/// ```
/// use gemsearch::gemini::GeminiClientBuilder;
///
/// let client = GeminiClientBuilder::new()
///     .api_key("test-key")
///     .model("gemini-2.5-flash")
///     .build()
///     .expect("Failed to create client");
/// ```
#[derive(Debug, Default)]
pub struct GeminiClientBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

impl GeminiClientBuilder {
    /// Creates a new `GeminiClientBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key used to authenticate requests.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model name for content generation.
    ///
    /// # Arguments
    ///
    /// * `model` - The model name (e.g., "gemini-2.5-flash" or "gemini-2.5-pro")
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Overrides the API base URL. Intended for tests and proxies.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the `GeminiClient` with the configured settings.
    ///
    /// # Returns
    ///
    /// Returns `Ok(GeminiClient)` if the client was created successfully,
    /// or `Err(GeminiError)` if configuration is invalid or incomplete.
    ///
    /// # Environment Variables
    ///
    /// If `api_key()` was not called, this method reads `GEMINI_API_KEY`;
    /// a missing key is a `MissingApiKey` error. If `model()` was not
    /// called, it reads `GEMINI_MODEL`, defaulting to `gemini-2.5-flash`.
    pub fn build(self) -> Result<GeminiClient, GeminiError> {
        // Builder value takes precedence over the environment
        let api_key = match self.api_key {
            Some(key) if !key.is_empty() => key,
            _ => std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(GeminiError::MissingApiKey)?,
        };

        let model = if let Some(m) = self.model {
            m
        } else {
            std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| crate::config::DEFAULT_MODEL.to_string())
        };

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        reqwest::Url::parse(&base_url)
            .map_err(|e| GeminiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(GeminiError::Network)?;

        Ok(GeminiClient {
            client,
            api_key,
            model,
            base_url,
        })
    }
}

/// Synchronous HTTP client for the Gemini content-generation API.
///
/// Every request enables the `googleSearch` tool so responses come back
/// with grounding metadata when the model searched the web. Construct via
/// `GeminiClientBuilder`.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

/// Trait for Gemini API client operations.
///
/// This trait enables mocking in unit tests and provides a clean interface
/// for the interactive loop.
pub trait GeminiClientTrait: Send + Sync {
    /// Generates a grounded response for the given prompt.
    ///
    /// # Returns
    ///
    /// The parsed response, or an error if the request fails or the API
    /// returns no candidates.
    fn generate_grounded(&self, prompt: &str) -> Result<GenerateContentResponse, GeminiError>;
}

impl GeminiClient {
    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the model name configured for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates a grounded response for the given prompt.
    ///
    /// This is the internal implementation called by the trait method.
    fn generate_internal(&self, prompt: &str) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request_body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "tools": [{"googleSearch": {}}]
        });

        debug!(model = %self.model, "sending grounded generateContent request");

        // Wrap the HTTP call with retry logic
        retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&request_body)
                .send()
                .map_err(|e| {
                    if e.is_timeout() {
                        GeminiError::Timeout(e)
                    } else {
                        GeminiError::Network(e)
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(GeminiError::Http {
                    status: status.as_u16(),
                });
            }

            // Decode the body separately from the transfer: a malformed
            // body is deterministic and must surface as a serialization
            // error instead of burning the retry budget as a network one.
            let body = response.text().map_err(GeminiError::Network)?;
            let parsed: GenerateContentResponse =
                serde_json::from_str(&body).map_err(GeminiError::Serialization)?;

            if parsed.candidates.is_empty() {
                return Err(GeminiError::Api {
                    message: "No response candidates returned".to_string(),
                });
            }

            Ok(parsed)
        })
    }
}

impl GeminiClientTrait for GeminiClient {
    fn generate_grounded(&self, prompt: &str) -> Result<GenerateContentResponse, GeminiError> {
        self.generate_internal(prompt)
    }
}

/// Retries an operation with exponential backoff.
///
/// Retries up to 3 times with delays of 1s, 2s, and 4s, only on transient
/// errors (HTTP 5xx, network errors, timeouts); client errors fail
/// immediately.
pub fn retry_with_backoff<F, T>(mut f: F) -> Result<T, GeminiError>
where
    F: FnMut() -> Result<T, GeminiError>,
{
    const MAX_RETRIES: usize = 3;
    const DELAYS: [u64; MAX_RETRIES] = [1, 2, 4]; // seconds

    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) => {
            if !should_retry(&e) {
                return Err(e);
            }
            e
        }
    };

    for &delay_secs in &DELAYS {
        warn!(delay_secs, error = %last_error, "retrying after transient error");
        thread::sleep(Duration::from_secs(delay_secs));

        match f() {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !should_retry(&e) {
                    return Err(e);
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Determines if an error should be retried.
///
/// Returns `true` for transient errors (HTTP 5xx, network errors, timeouts).
/// Returns `false` for client errors (HTTP 4xx) and other non-retryable errors.
fn should_retry(error: &GeminiError) -> bool {
    match error {
        GeminiError::Network(_) => true,
        GeminiError::Timeout(_) => true,
        GeminiError::Http { status } => (500..600).contains(status),
        GeminiError::Serialization(_) => false,
        GeminiError::Api { .. } => false,
        GeminiError::InvalidUrl(_) => false,
        GeminiError::MissingApiKey => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::error::Error;

    #[test]
    fn network_error_variant_creation_and_display() {
        let client = reqwest::blocking::Client::new();
        let reqwest_error = client.get("not-a-valid-url").build().unwrap_err();
        let gemini_error = GeminiError::Network(reqwest_error);

        let error_msg = format!("{}", gemini_error);
        assert!(error_msg.contains("Network error"));
    }

    #[test]
    fn timeout_error_variant_creation_and_display() {
        let client = reqwest::blocking::Client::new();
        let reqwest_error = client.get("http://").build().unwrap_err();
        let gemini_error = GeminiError::Timeout(reqwest_error);

        assert_eq!(format!("{}", gemini_error), "Request timed out");
    }

    #[test]
    fn http_error_variant_with_status_code() {
        let gemini_error = GeminiError::Http { status: 404 };

        let error_msg = format!("{}", gemini_error);
        assert!(error_msg.contains("HTTP error"));
        assert!(error_msg.contains("404"));
    }

    #[test]
    fn serialization_error_variant_wraps_serde_errors() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let gemini_error = GeminiError::Serialization(json_error);

        let error_msg = format!("{}", gemini_error);
        assert!(error_msg.contains("Serialization error"));
        assert!(gemini_error.source().is_some());
    }

    #[test]
    fn missing_api_key_error_names_the_env_var() {
        let error_msg = format!("{}", GeminiError::MissingApiKey);
        assert!(error_msg.contains("GEMINI_API_KEY"));
    }

    #[test]
    #[serial]
    fn build_fails_without_api_key() {
        unsafe {
            std::env::remove_var("GEMINI_API_KEY");
        }

        let result = GeminiClientBuilder::new().build();
        assert!(matches!(result, Err(GeminiError::MissingApiKey)));
    }

    #[test]
    #[serial]
    fn build_reads_api_key_from_environment() {
        unsafe {
            std::env::set_var("GEMINI_API_KEY", "env-key");
            std::env::remove_var("GEMINI_MODEL");
        }

        let client = GeminiClientBuilder::new().build().unwrap();
        assert_eq!(client.model(), crate::config::DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);

        unsafe {
            std::env::remove_var("GEMINI_API_KEY");
        }
    }

    #[test]
    #[serial]
    fn build_reads_gemini_model_environment_variable_if_set() {
        unsafe {
            std::env::set_var("GEMINI_MODEL", "gemini-2.5-pro");
        }

        let client = GeminiClientBuilder::new()
            .api_key("test-key")
            .build()
            .unwrap();
        assert_eq!(client.model(), "gemini-2.5-pro");

        unsafe {
            std::env::remove_var("GEMINI_MODEL");
        }
    }

    #[test]
    #[serial]
    fn builder_model_takes_precedence_over_env_var() {
        unsafe {
            std::env::set_var("GEMINI_MODEL", "env-model");
        }

        let client = GeminiClientBuilder::new()
            .api_key("test-key")
            .model("builder-model")
            .build()
            .unwrap();
        assert_eq!(client.model(), "builder-model");

        unsafe {
            std::env::remove_var("GEMINI_MODEL");
        }
    }

    #[test]
    fn build_returns_error_if_invalid_base_url_provided() {
        let result = GeminiClientBuilder::new()
            .api_key("test-key")
            .base_url("not-a-valid-url")
            .build();
        assert!(matches!(result, Err(GeminiError::InvalidUrl(_))));
    }

    #[test]
    fn retry_succeeds_after_transient_error() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<&str, GeminiError> = retry_with_backoff(move || {
            let count = attempts_clone.fetch_add(1, Ordering::SeqCst);
            if count < 1 {
                Err(GeminiError::Http { status: 500 })
            } else {
                Ok("success")
            }
        });

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_stops_after_3_attempts() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<&str, GeminiError> = retry_with_backoff(move || {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err(GeminiError::Http { status: 503 })
        });

        assert!(result.is_err());
        // Initial attempt + 3 retries = 4 total attempts
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn retry_does_not_occur_on_http_4xx_errors() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<&str, GeminiError> = retry_with_backoff(move || {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err(GeminiError::Http { status: 404 })
        });

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_does_not_occur_on_api_errors() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        let result: Result<&str, GeminiError> = retry_with_backoff(move || {
            attempts_clone.fetch_add(1, Ordering::SeqCst);
            Err(GeminiError::Api {
                message: "No response candidates returned".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trait_can_be_implemented_by_mock_struct() {
        struct MockClient {
            text: String,
        }

        impl GeminiClientTrait for MockClient {
            fn generate_grounded(
                &self,
                _prompt: &str,
            ) -> Result<GenerateContentResponse, GeminiError> {
                serde_json::from_value(serde_json::json!({
                    "candidates": [{"content": {"parts": [{"text": self.text}]}}]
                }))
                .map_err(GeminiError::Serialization)
            }
        }

        let mock = MockClient {
            text: "test response".to_string(),
        };
        let result = mock.generate_grounded("test prompt").unwrap();
        assert_eq!(result.text(), "test response");
    }

    #[test]
    fn malformed_response_body_surfaces_as_serialization_error_without_retry() {
        use std::io::{Read, Write};
        use std::net::TcpListener;
        use std::time::Instant;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let body = "not json";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        let client = GeminiClientBuilder::new()
            .api_key("test-key")
            .model("gemini-2.5-flash")
            .base_url(format!("http://{addr}"))
            .build()
            .unwrap();

        let start = Instant::now();
        let result = client.generate_grounded("hello");
        server.join().unwrap();

        assert!(matches!(result, Err(GeminiError::Serialization(_))));
        // A broken body is deterministic: the call must fail on the first
        // attempt instead of sleeping through the backoff schedule.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn generate_serializes_request_body_correctly() {
        let request_body = serde_json::json!({
            "contents": [{"parts": [{"text": "test prompt"}]}],
            "tools": [{"googleSearch": {}}]
        });

        assert_eq!(request_body["contents"][0]["parts"][0]["text"], "test prompt");
        assert!(request_body["tools"][0]["googleSearch"].is_object());
    }
}
