//! Response types for the Gemini `generateContent` endpoint.
//!
//! Mirrors the upstream camelCase JSON schema. Every nested field the API
//! may omit is an `Option`, so partial responses deserialize cleanly and
//! degrade to empty results downstream.

use serde::Deserialize;

/// Top-level response from a `generateContent` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Generated candidates. Only index 0 is consulted.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    ///
    /// Mirrors the upstream SDK's `response.text` convenience accessor.
    /// Returns an empty string when there are no candidates or no text parts.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Grounding metadata of the first candidate, if the response was
    /// grounded with web search.
    pub fn grounding_metadata(&self) -> Option<&GroundingMetadata> {
        self.candidates.first()?.grounding_metadata.as_ref()
    }
}

/// A single generated candidate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

/// Content of a candidate, a sequence of parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single content part. Only text parts are consumed here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
}

/// Metadata linking a grounded response to its web search evidence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    /// Spans of the response text and the chunks that support them.
    pub grounding_supports: Option<Vec<GroundingSupport>>,
    /// Retrieved sources eligible for citation.
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
    /// Search queries the model issued while grounding.
    pub web_search_queries: Option<Vec<String>>,
}

/// One supported span: a segment of the response plus the indices of the
/// chunks that back it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    pub segment: Option<Segment>,
    /// Indices into `grounding_chunks`. May reference out-of-range or
    /// web-less chunks; such references are skipped, not errors.
    pub grounding_chunk_indices: Option<Vec<usize>>,
}

/// A span of the generated text, measured against the original text before
/// any citation insertion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
}

/// A single retrieved source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    pub web: Option<WebSource>,
}

/// Web page backing a grounding chunk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSource {
    pub uri: Option<String>,
    pub title: Option<String>,
}
