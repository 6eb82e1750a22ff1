/// Gemini HTTP client module.
///
/// This module provides a blocking HTTP client for the Gemini
/// `generateContent` API with Google Search grounding enabled, including
/// error handling, retry logic, and the response data model.
mod client;
pub mod types;

pub use client::{
    DEFAULT_BASE_URL, GeminiClient, GeminiClientBuilder, GeminiClientTrait, GeminiError,
};
pub use types::{GenerateContentResponse, GroundingMetadata};
