//! Renderer module — trait-based format dispatch.

pub mod json;
pub mod markdown;

use anyhow::{anyhow, Result};
use bashmap_syntax::{FileDependencies, FunctionSummary};

/// Trait for rendering analysis results into a specific output format.
pub trait Renderer {
    fn render_summary(&self, summary: &FunctionSummary) -> Result<String>;
    fn render_dependencies(&self, deps: &[FileDependencies]) -> Result<String>;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "markdown" | "md" => Ok(Box::new(markdown::MarkdownRenderer)),
        "json" => Ok(Box::new(json::JsonRenderer)),
        _ => Err(anyhow!(
            "unknown format: {}. Use markdown or json",
            format
        )),
    }
}
