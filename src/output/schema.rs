//! Database schema for persisted crawl reports

/// SQL schema for the report database
pub const SCHEMA_SQL: &str = r#"
-- One row per finished crawl
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_url TEXT NOT NULL,
    domain TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    duration_ms INTEGER NOT NULL,
    config_hash TEXT,
    total_pages INTEGER NOT NULL,
    successful_pages INTEGER NOT NULL,
    failed_pages INTEGER NOT NULL,
    total_bytes INTEGER NOT NULL,
    avg_response_ms INTEGER NOT NULL,
    robots_blocked INTEGER NOT NULL,
    cache_hits INTEGER NOT NULL,
    cache_misses INTEGER NOT NULL
);

-- Every URL taken off the queue
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    final_url TEXT,
    status_code INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    title TEXT,
    description TEXT,
    body_bytes INTEGER NOT NULL,
    response_time_ms INTEGER NOT NULL,
    crawled_at TEXT NOT NULL,
    error TEXT,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);
CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status_code);

-- Links found on a page
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id),
    url TEXT NOT NULL,
    anchor_text TEXT NOT NULL,
    scope TEXT NOT NULL,
    follow INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_page ON links(page_id);
CREATE INDEX IF NOT EXISTS idx_links_url ON links(url);

-- Images found on a page
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id),
    url TEXT NOT NULL,
    alt TEXT,
    title TEXT,
    width INTEGER,
    height INTEGER
);

CREATE INDEX IF NOT EXISTS idx_images_page ON images(page_id);

-- Entries of every sitemap document read during the crawl
CREATE TABLE IF NOT EXISTS sitemap_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    sitemap TEXT,
    is_index INTEGER NOT NULL,
    loc TEXT NOT NULL,
    lastmod TEXT,
    changefreq TEXT NOT NULL,
    priority REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sitemap_urls_run ON sitemap_urls(run_id);
"#;

/// Creates all tables and indexes if they do not exist yet
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
