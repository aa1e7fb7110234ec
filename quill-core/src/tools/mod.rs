//! Server-executed tools exposed to the model.

pub mod generate_image;
pub mod search_web;

pub use generate_image::{
    GeminiImageGenerator, GenerateImageTool, ImageGenerator, GENERATE_IMAGE,
};
pub use search_web::{SearchClient, SearchResponse, SearchResult, SearchWebTool, TavilyClient, SEARCH_WEB};

use llm::ToolRegistry;
use std::sync::Arc;

/// Build the per-request tool registry. Tool handlers never fail: each
/// execute captures its own failures as a tagged result payload.
pub fn build_registry(image: GenerateImageTool, search: SearchWebTool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let image = Arc::new(image);
    registry.register(GenerateImageTool::definition(), move |args| {
        let image = image.clone();
        async move { Ok(image.execute(args).await) }
    });

    let search = Arc::new(search);
    registry.register(SearchWebTool::definition(), move |args| {
        let search = search.clone();
        async move { Ok(search.execute(args).await) }
    });

    registry
}
