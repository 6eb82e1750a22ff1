//! API key and model resolution.
//!
//! Configuration comes from three places, in precedence order: command-line
//! flags, environment variables, built-in defaults. A `.env` file in the
//! working directory is loaded into the environment at startup via
//! `dotenvy`, so keys kept there behave like exported variables.

use anyhow::{Context, Result};

/// Environment variable holding the Gemini API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Message for a missing API key. Shared between the config resolver, the
/// client builder, and the binary's error classification, so the three
/// cannot drift apart.
pub const MISSING_API_KEY_MSG: &str =
    "No API key configured: set GEMINI_API_KEY or pass --api-key";

/// Environment variable overriding the default model.
pub const MODEL_VAR: &str = "GEMINI_MODEL";

/// Model used when neither the flag nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Models known to support Google Search grounding, shown by `--list-models`.
pub const KNOWN_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

/// Loads a `.env` file from the working directory into the environment,
/// if one exists. Missing files are fine; unreadable ones are not.
pub fn load_dotenv() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).context("Failed to load .env file"),
    }
}

/// Resolves the API key: flag value first, then the environment.
///
/// # Errors
///
/// Returns an error naming the env var when no key is configured.
pub fn resolve_api_key(flag: Option<&str>) -> Result<String> {
    if let Some(key) = flag.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }

    std::env::var(API_KEY_VAR)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .context(MISSING_API_KEY_MSG)
}

/// Resolves the model name: flag, then environment, then the default.
pub fn resolve_model(flag: Option<&str>) -> String {
    if let Some(model) = flag.filter(|m| !m.trim().is_empty()) {
        return model.to_string();
    }

    std::env::var(MODEL_VAR)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}
