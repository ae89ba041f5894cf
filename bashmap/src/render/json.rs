//! JSON renderer — structured output for tooling integration.
//!
//! Serializes the analysis model directly, so field names match the
//! library's serde representation (`startBlock`, empty strings for absent
//! comment text).

use crate::render::Renderer;
use anyhow::Result;
use bashmap_syntax::{FileDependencies, FunctionSummary};

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_summary(&self, summary: &FunctionSummary) -> Result<String> {
        Ok(serde_json::to_string_pretty(summary)? + "\n")
    }

    fn render_dependencies(&self, deps: &[FileDependencies]) -> Result<String> {
        Ok(serde_json::to_string_pretty(deps)? + "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bashmap_syntax::{extract_functions, DuplicateScope};

    #[test]
    fn summary_round_trips_through_serde_json() {
        let functions = extract_functions("a.sh", "foo() { :; }\nfoo() { :; }\n").unwrap();
        let summary = FunctionSummary::new(functions, DuplicateScope::PerFile);
        let out = JsonRenderer.render_summary(&summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["duplicates"], serde_json::json!(["foo"]));
        assert_eq!(value["functions"][1]["startBlock"], 2);
        assert_eq!(value["functions"][0]["description"], "");
    }

    #[test]
    fn dependencies_render_as_array() {
        let out = JsonRenderer
            .render_dependencies(&[FileDependencies::new("main.sh")])
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["file"], "main.sh");
        assert_eq!(value[0]["files"], serde_json::json!([]));
    }
}
