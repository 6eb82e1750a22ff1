pub mod citations;
pub mod config;
pub mod gemini;

pub use citations::{
    SourceEntry, annotate, format_search_queries, format_sources, list_search_queries,
    list_sources,
};
pub use gemini::{
    GeminiClient, GeminiClientBuilder, GeminiClientTrait, GeminiError, GenerateContentResponse,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotator_accessible_from_crate_root() {
        let response = GenerateContentResponse::default();
        assert_eq!(annotate(&response), "");
        assert!(list_sources(&response).is_empty());
        assert!(list_search_queries(&response).is_empty());
    }

    #[test]
    fn client_builder_accessible_from_crate_root() {
        let result = GeminiClientBuilder::new()
            .api_key("test-key")
            .base_url("not a url")
            .build();
        assert!(matches!(result, Err(GeminiError::InvalidUrl(_))));
    }
}
