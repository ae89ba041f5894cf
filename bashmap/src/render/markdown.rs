//! GitHub-flavored markdown renderer.
//!
//! Functions become one table row each; dependency records become one
//! section per analyzed file.

use crate::render::Renderer;
use anyhow::Result;
use bashmap_syntax::{FileDependencies, FunctionSummary};
use std::collections::BTreeSet;

pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render_summary(&self, summary: &FunctionSummary) -> Result<String> {
        let mut output = String::new();

        output.push_str("## Functions\n\n");
        if summary.functions.is_empty() {
            output.push_str("_No functions found._\n");
        } else {
            output.push_str("| Name | File | Lines | Arguments | Description |\n");
            output.push_str("|------|------|-------|-----------|-------------|\n");
            for func in &summary.functions {
                let lines = if func.start_block == func.start {
                    format!("{}-{}", func.start, func.end)
                } else {
                    format!("{}-{} (doc {})", func.start, func.end, func.start_block)
                };
                output.push_str(&format!(
                    "| `{}` | {} | {} | {} | {} |\n",
                    func.name,
                    table_cell(&func.file),
                    lines,
                    table_cell(func.arguments()),
                    table_cell(func.description()),
                ));
            }
        }

        if !summary.duplicates.is_empty() {
            output.push_str("\n## Duplicates\n\n");
            for name in &summary.duplicates {
                output.push_str(&format!("- `{}`\n", name));
            }
        }

        Ok(output)
    }

    fn render_dependencies(&self, deps: &[FileDependencies]) -> Result<String> {
        let mut output = String::new();

        for (i, record) in deps.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            output.push_str(&format!("## {}\n\n", record.file));
            if record.is_empty() {
                output.push_str("_No utility dependencies._\n");
                continue;
            }
            output.push_str(&format!("- Files: {}\n", code_list(&record.files)));
            output.push_str(&format!("- Functions: {}\n", code_list(&record.functions)));
        }

        Ok(output)
    }
}

fn code_list(items: &BTreeSet<String>) -> String {
    items
        .iter()
        .map(|item| format!("`{}`", item))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape pipes and fold newlines so text fits in one table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}
