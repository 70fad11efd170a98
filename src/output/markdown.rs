//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl results,
//! including settings, statistics, fetched pages and an error report.

use crate::output::{CrawlReport, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Pages listed in full before the summary is truncated
const MAX_LISTED_PAGES: usize = 200;

/// Writes a markdown summary of `report` to `output_path`
pub fn generate_markdown_summary(report: &CrawlReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let stats = report.statistics();
    let mut md = String::new();

    md.push_str("# Ripple-Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", report.seed));
    md.push_str(&format!("- **Max Depth**: {}\n", report.max_depth));
    md.push_str(&format!(
        "- **Workers**: {} downloaders, {} extractors, {} per host\n",
        report.downloaders, report.extractors, report.per_host
    ));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        report.duration_seconds()
    ));
    let status = if report.cancelled { "Interrupted" } else { "Completed" };
    md.push_str(&format!("- **Status**: {}\n\n", status));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Fetched**: {}\n", stats.total_pages));
    md.push_str(&format!("- **Errors**: {}\n", stats.total_errors));
    md.push_str(&format!("- **Unique Hosts**: {}\n", stats.unique_hosts));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    if !stats.errors_by_kind.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");
        for (kind, count) in &stats.errors_by_kind {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    if !report.result.pages.is_empty() {
        md.push_str("## Pages\n\n");
        md.push_str("Listed in completion order.\n\n");
        for page in report.result.pages.iter().take(MAX_LISTED_PAGES) {
            md.push_str(&format!("- {}\n", page));
        }
        if report.result.pages.len() > MAX_LISTED_PAGES {
            md.push_str(&format!(
                "\n... and {} more\n",
                report.result.pages.len() - MAX_LISTED_PAGES
            ));
        }
        md.push('\n');
    }

    if !report.result.errors.is_empty() {
        md.push_str("## Failed URLs\n\n");
        md.push_str("| URL | Error |\n");
        md.push_str("|-----|-------|\n");

        let mut errors: Vec<_> = report.result.errors.iter().collect();
        errors.sort_by(|a, b| a.0.cmp(b.0));
        for (url, error) in errors {
            md.push_str(&format!("| {} | {} |\n", url, error));
        }
        md.push('\n');
    }

    md
}
