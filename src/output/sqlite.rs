//! SQLite report writer
//!
//! Persists a finished [`CrawlReport`] into a SQLite database: one run row,
//! then every page with its links and images, then the sitemap entries.

use crate::crawler::{CrawlReport, CrawlResult};
use crate::output::schema::initialize_schema;
use crate::CrawlError;
use rusqlite::{params, Connection, Transaction};
use std::path::Path;

/// Writes crawl reports to a SQLite database
pub struct SqliteReportWriter {
    conn: Connection,
}

impl SqliteReportWriter {
    /// Opens (or creates) the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteReportWriter)` - Database opened and schema ready
    /// * `Err(CrawlError::Database)` - Failed to open or initialize
    pub fn create(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Writes `report` in a single transaction and returns the new run id
    pub fn write_report(
        &mut self,
        report: &CrawlReport,
        config_hash: Option<&str>,
    ) -> Result<i64, CrawlError> {
        let tx = self.conn.transaction()?;

        let stats = &report.stats;
        tx.execute(
            "INSERT INTO runs (
                start_url, domain, started_at, finished_at, duration_ms, config_hash,
                total_pages, successful_pages, failed_pages, total_bytes, avg_response_ms,
                robots_blocked, cache_hits, cache_misses
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                report.start_url,
                report.domain,
                report.start_time.to_rfc3339(),
                report.end_time.map(|t| t.to_rfc3339()),
                report.duration.as_millis() as i64,
                config_hash,
                stats.total_pages as i64,
                stats.successful_pages as i64,
                stats.failed_pages as i64,
                stats.total_bytes as i64,
                stats.average_response_time.as_millis() as i64,
                stats.robots_blocked as i64,
                stats.cache_hits as i64,
                stats.cache_misses as i64,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        let mut pages: Vec<&CrawlResult> = report.pages.values().collect();
        pages.sort_by(|a, b| a.url.cmp(&b.url));
        for page in pages {
            insert_page(&tx, run_id, page)?;
        }

        for sitemap in &report.sitemaps {
            for entry in &sitemap.urls {
                tx.execute(
                    "INSERT INTO sitemap_urls (run_id, sitemap, is_index, loc, lastmod, changefreq, priority)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        run_id,
                        sitemap.source,
                        sitemap.is_index,
                        entry.loc,
                        entry.lastmod,
                        entry.changefreq.as_str(),
                        entry.priority,
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(run_id)
    }

    /// Number of pages stored for `run_id`
    pub fn page_count(&self, run_id: i64) -> Result<i64, CrawlError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn insert_page(tx: &Transaction<'_>, run_id: i64, page: &CrawlResult) -> Result<(), CrawlError> {
    tx.execute(
        "INSERT INTO pages (
            run_id, url, final_url, status_code, content_type, title, description,
            body_bytes, response_time_ms, crawled_at, error
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            run_id,
            page.url,
            page.final_url,
            page.status_code,
            page.content_type,
            page.title,
            page.description,
            page.body.len() as i64,
            page.response_time.as_millis() as i64,
            page.crawled_at.to_rfc3339(),
            page.error,
        ],
    )?;
    let page_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO links (page_id, url, anchor_text, scope, follow) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for link in &page.links {
            stmt.execute(params![
                page_id,
                link.url,
                link.anchor_text,
                link.scope.as_str(),
                link.follow
            ])?;
        }
    }

    let mut stmt = tx.prepare_cached(
        "INSERT INTO images (page_id, url, alt, title, width, height) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for image in &page.images {
        stmt.execute(params![
            page_id,
            image.url,
            image.alt,
            image.title,
            image.width,
            image.height
        ])?;
    }

    Ok(())
}
