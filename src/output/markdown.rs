//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of crawl reports,
//! including statistics, failed pages, and robots/sitemap details.

use crate::crawler::{CrawlReport, LinkScope};
use crate::CrawlError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failed pages listed before the table is cut off
const MAX_FAILED_ROWS: usize = 50;

/// Writes the markdown summary of `report` to `output_path`
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(CrawlError::Io)` - Failed to write summary
pub fn write_markdown_summary(report: &CrawlReport, output_path: &Path) -> Result<(), CrawlError> {
    let markdown = format_markdown_summary(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl report as markdown
pub fn format_markdown_summary(report: &CrawlReport) -> String {
    let mut md = String::new();
    let stats = &report.stats;

    md.push_str("# SEO Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Start URL**: {}\n", report.start_url));
    md.push_str(&format!("- **Domain**: {}\n", report.domain));
    md.push_str(&format!("- **Started**: {}\n", report.start_time.to_rfc3339()));
    if let Some(finished) = &report.end_time {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n\n",
        report.duration.as_secs_f64()
    ));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Total Pages | {} |\n", stats.total_pages));
    md.push_str(&format!("| Successful | {} |\n", stats.successful_pages));
    md.push_str(&format!("| Failed | {} |\n", stats.failed_pages));
    md.push_str(&format!("| Success Rate | {:.2}% |\n", stats.success_rate()));
    md.push_str(&format!("| Total Bytes | {} |\n", stats.total_bytes));
    md.push_str(&format!(
        "| Average Response Time | {} ms |\n",
        stats.average_response_time.as_millis()
    ));
    md.push_str(&format!("| Blocked by robots.txt | {} |\n", stats.robots_blocked));
    md.push_str(&format!("| Cache Hits | {} |\n", stats.cache_hits));
    md.push_str(&format!("| Cache Misses | {} |\n\n", stats.cache_misses));

    // Link totals
    let (internal, external) = report
        .pages
        .values()
        .flat_map(|page| page.links.iter())
        .fold((0usize, 0usize), |(internal, external), link| match link.scope {
            LinkScope::Internal => (internal + 1, external),
            LinkScope::External => (internal, external + 1),
        });
    let images: usize = report.pages.values().map(|page| page.images.len()).sum();
    md.push_str("## Links and Images\n\n");
    md.push_str(&format!("- **Internal Links**: {}\n", internal));
    md.push_str(&format!("- **External Links**: {}\n", external));
    md.push_str(&format!("- **Images**: {}\n\n", images));

    // Robots.txt
    md.push_str("## Robots.txt\n\n");
    match &report.robots_txt {
        Some(robots) => {
            md.push_str(&format!("- **User-agent sections**: {}\n", robots.rules.len()));
            md.push_str(&format!(
                "- **Default rules**: {}\n",
                if robots.default_rules.is_some() { "yes" } else { "no" }
            ));
            if let Some(host) = &robots.host {
                md.push_str(&format!("- **Host**: {}\n", host));
            }
            for sitemap in &robots.sitemaps {
                md.push_str(&format!("- **Sitemap**: {}\n", sitemap));
            }
            md.push('\n');
        }
        None => md.push_str("Not consulted.\n\n"),
    }

    // Sitemaps
    if !report.sitemaps.is_empty() {
        md.push_str("## Sitemaps\n\n");
        md.push_str("| Location | Type | Entries |\n");
        md.push_str("|----------|------|---------|\n");
        for sitemap in &report.sitemaps {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                sitemap.source.as_deref().unwrap_or("-"),
                if sitemap.is_index { "index" } else { "urlset" },
                sitemap.urls.len()
            ));
        }
        md.push('\n');
    }

    // Failed pages
    let failed = report.failed_pages();
    if !failed.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Status | Error |\n");
        md.push_str("|-----|--------|-------|\n");
        for page in failed.iter().take(MAX_FAILED_ROWS) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                page.url,
                page.status_code,
                page.error.as_deref().unwrap_or("").replace('|', "\\|")
            ));
        }
        if failed.len() > MAX_FAILED_ROWS {
            md.push_str(&format!(
                "\n... and {} more\n",
                failed.len() - MAX_FAILED_ROWS
            ));
        }
        md.push('\n');
    }

    md
}
