//! Output module for persisting and summarizing crawl reports
//!
//! This module handles:
//! - Writing finished reports into a SQLite database
//! - Generating markdown summaries of crawl results

mod markdown;
mod schema;
mod sqlite;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteReportWriter;
