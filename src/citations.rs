//! Citation annotation for grounded Gemini responses.
//!
//! Given a response whose grounding metadata links text spans to retrieved
//! web sources, [`annotate`] splices inline citation markers into the
//! response text at the span end offsets. [`list_sources`] and
//! [`list_search_queries`] expose the metadata as display-ready listings.
//!
//! All functions here are pure: they never mutate the response and repeated
//! calls on identical input produce identical output.

use crate::gemini::types::{GenerateContentResponse, GroundingChunk};

/// Titles longer than this are shortened in citation markers.
const MAX_MARKER_TITLE_LEN: usize = 30;

/// Prefix of the Google grounding redirect URIs that carry no readable
/// destination. Display layers replace them with a placeholder.
const GOOGLE_REDIRECT_PREFIX: &str =
    "https://vertexaisearch.cloud.google.com/grounding-api-redirect/";

/// Placeholder shown in place of an opaque Google redirect URI.
const GOOGLE_REDIRECT_PLACEHOLDER: &str = "[Google Search Result]";

/// Fallback title for sources that did not report one.
const UNTITLED_SOURCE: &str = "Unknown Source";

/// A citable source extracted from the response's grounding chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// 1-based position in the original chunk list. Chunks without a
    /// citable web URI are skipped but never renumbered, so gaps may
    /// appear.
    pub index: usize,
    pub title: String,
    pub uri: String,
}

/// Splices inline citation markers into the response text.
///
/// Each grounding support names a span end offset and the chunks backing
/// that span. Supports are processed in descending offset order so that an
/// insertion never shifts an offset that has not been processed yet; ties
/// keep their original relative order. A support contributes the markers of
/// every referenced chunk that resolves to a web source, joined with `", "`
/// and inserted immediately before the span end.
///
/// Markers are bracketed titles, shortened to 27 characters plus `"..."`
/// when the title exceeds 30. References to out-of-range chunks or chunks
/// without a web URI are skipped silently.
///
/// Offsets are character offsets into the original text; an offset past the
/// end of the text appends instead. When the response carries no grounding
/// supports or chunks, the text is returned unchanged.
pub fn annotate(response: &GenerateContentResponse) -> String {
    let mut text = response.text();

    let Some(metadata) = response.grounding_metadata() else {
        return text;
    };
    let (Some(supports), Some(chunks)) = (
        metadata.grounding_supports.as_ref(),
        metadata.grounding_chunks.as_ref(),
    ) else {
        return text;
    };

    // Supports with a span end and at least one chunk reference, sorted by
    // end offset descending. The sort is stable, so equal offsets keep the
    // order the API returned them in.
    let mut ordered: Vec<(usize, &[usize])> = supports
        .iter()
        .filter_map(|support| {
            let end_index = support.segment.as_ref()?.end_index?;
            let indices = support.grounding_chunk_indices.as_deref()?;
            (!indices.is_empty()).then_some((end_index, indices))
        })
        .collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    for (end_index, indices) in ordered {
        let markers: Vec<String> = indices
            .iter()
            .filter_map(|&i| citation_marker(chunks.get(i)?))
            .collect();

        if !markers.is_empty() {
            let at = byte_offset(&text, end_index);
            text.insert_str(at, &markers.join(", "));
        }
    }

    text
}

/// Lists the citable sources of the response, in chunk order.
///
/// Chunks without a web URI are skipped, matching what the annotator is
/// willing to cite; the surviving entries keep their 1-based position in
/// the original chunk list. Empty when the response carries no grounding
/// chunks.
pub fn list_sources(response: &GenerateContentResponse) -> Vec<SourceEntry> {
    let Some(chunks) = response
        .grounding_metadata()
        .and_then(|m| m.grounding_chunks.as_ref())
    else {
        return Vec::new();
    };

    chunks
        .iter()
        .enumerate()
        .filter_map(|(i, chunk)| {
            let web = chunk.web.as_ref()?;
            let uri = web.uri.clone()?;
            Some(SourceEntry {
                index: i + 1,
                title: web
                    .title
                    .clone()
                    .unwrap_or_else(|| UNTITLED_SOURCE.to_string()),
                uri,
            })
        })
        .collect()
}

/// Lists the web search queries the model issued while grounding, in order.
/// Empty when the response carries none.
pub fn list_search_queries(response: &GenerateContentResponse) -> Vec<String> {
    response
        .grounding_metadata()
        .and_then(|m| m.web_search_queries.clone())
        .unwrap_or_default()
}

/// Renders the source listing as a terminal-ready string.
///
/// Returns an empty string when there are no sources, so callers can skip
/// the section entirely.
pub fn format_sources(response: &GenerateContentResponse) -> String {
    let sources = list_sources(response);
    if sources.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n--- Sources ---\n");
    for source in sources {
        let display_uri = if source.uri.starts_with(GOOGLE_REDIRECT_PREFIX) {
            GOOGLE_REDIRECT_PLACEHOLDER
        } else {
            source.uri.as_str()
        };
        out.push_str(&format!(
            "{}. {}\n   {}\n\n",
            source.index, source.title, display_uri
        ));
    }
    out
}

/// Renders the search-query listing as a terminal-ready string, or an empty
/// string when the response carries no queries.
pub fn format_search_queries(response: &GenerateContentResponse) -> String {
    let queries = list_search_queries(response);
    if queries.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n--- Search Queries ---\n");
    for (i, query) in queries.iter().enumerate() {
        out.push_str(&format!("{}. \"{}\"\n", i + 1, query));
    }
    out
}

/// Builds the citation marker for a single chunk, or `None` when the chunk
/// has no web URI to cite.
fn citation_marker(chunk: &GroundingChunk) -> Option<String> {
    let web = chunk.web.as_ref()?;
    web.uri.as_ref()?;
    let title = web.title.as_deref().unwrap_or(UNTITLED_SOURCE);
    Some(format!("[{}]", short_title(title)))
}

/// Shortens a title to 27 characters plus an ellipsis when it exceeds the
/// marker length limit.
fn short_title(title: &str) -> String {
    if title.chars().count() > MAX_MARKER_TITLE_LEN {
        let head: String = title.chars().take(MAX_MARKER_TITLE_LEN - 3).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

/// Converts a character offset into a byte offset, clamping past-the-end
/// offsets to the end of the text.
fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
