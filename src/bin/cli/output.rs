//! Output formatting for CLI operations.

use serde_json::json;
use std::path::{Path, PathBuf};

use jarwright::MergeResult;

/// What a finished transform command did.
pub struct TransformSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub steps: Vec<String>,
    pub output_size: u64,
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats merge results
    fn format_merge_result(&self, output: &Path, result: &MergeResult, output_size: u64) -> String;

    /// Formats transform results
    fn format_transform_result(&self, summary: &TransformSummary) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_merge_result(&self, output: &Path, result: &MergeResult, output_size: u64) -> String {
        let mut out = format!(
            "Merged into {} ({})\n",
            output.display(),
            humanize_bytes(output_size)
        );
        out.push_str(&format!("  Written:        {}\n", result.entries_written));
        if result.entries_overwritten > 0 {
            out.push_str(&format!("  Overwritten:    {}\n", result.entries_overwritten));
        }
        if result.entries_skipped > 0 {
            out.push_str(&format!("  Skipped:        {}\n", result.entries_skipped));
        }
        if result.entries_excluded > 0 {
            out.push_str(&format!("  Excluded:       {}\n", result.entries_excluded));
        }
        if result.services_merged > 0 {
            out.push_str(&format!("  Services:       {} merged\n", result.services_merged));
        }
        if result.plugin_caches_merged > 0 {
            out.push_str(&format!("  Plugin caches:  {} merged\n", result.plugin_caches_merged));
        }
        out
    }

    fn format_transform_result(&self, summary: &TransformSummary) -> String {
        let mut out = if summary.input == summary.output {
            format!("Transformed {} in place", summary.input.display())
        } else {
            format!(
                "Transformed {} -> {}",
                summary.input.display(),
                summary.output.display()
            )
        };
        out.push_str(&format!(" ({})\n", humanize_bytes(summary.output_size)));
        for step in &summary.steps {
            out.push_str(&format!("  applied {}\n", step));
        }
        out
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_merge_result(&self, output: &Path, result: &MergeResult, output_size: u64) -> String {
        let obj = json!({
            "output": output.display().to_string(),
            "output_size": output_size,
            "entries_written": result.entries_written,
            "entries_overwritten": result.entries_overwritten,
            "entries_skipped": result.entries_skipped,
            "entries_excluded": result.entries_excluded,
            "services_merged": result.services_merged,
            "plugin_caches_merged": result.plugin_caches_merged,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_transform_result(&self, summary: &TransformSummary) -> String {
        let obj = json!({
            "input": summary.input.display().to_string(),
            "output": summary.output.display().to_string(),
            "output_size": summary.output_size,
            "steps": summary.steps,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_bytes() {
        assert_eq!(humanize_bytes(512), "512 B");
        assert_eq!(humanize_bytes(1536), "1.5 KB");
        assert_eq!(humanize_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_json_merge_result() {
        let result = MergeResult {
            entries_written: 3,
            services_merged: 1,
            ..MergeResult::default()
        };
        let text = JsonFormatter.format_merge_result(Path::new("out.jar"), &result, 10);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["entries_written"], 3);
        assert_eq!(value["services_merged"], 1);
        assert_eq!(value["output"], "out.jar");
    }
}
