//! SQLite-backed article store

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use shared::{
    split_tags, ArticlePage, ArticleQuery, ArticleRecord, ArticleStatus, ArticleSummary, FieldUpdate, NewArticle,
    ReadFilter, StatusFilter,
};

use crate::core::maintenance::{canonical_tag_list, canonical_tags, canonical_title};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::ArticleStore;

pub const ARTICLES_TABLE: &str = "articles";
const SHADOW_TABLE: &str = "articles_new";

const ARTICLE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_articles_title ON articles(title)",
    "CREATE INDEX IF NOT EXISTS idx_articles_tag_seed_created_at ON articles(tag_seed, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_articles_read_created ON articles(is_read, created_at DESC)",
];

const RECORD_COLUMNS: &str = "id, title, tags, content, tag_seed, created_at, status, error_message, is_read";
const SUMMARY_COLUMNS: &str = "id, title, tags, tag_seed, created_at, status, error_message, is_read";

/// Table definition shared by the live and shadow tables
fn table_schema(table: &str, if_not_exists: bool) -> String {
    format!(
        "CREATE TABLE {guard}{table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            tags TEXT NOT NULL,
            content TEXT NOT NULL,
            tag_seed TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status TEXT DEFAULT 'completed',
            error_message TEXT,
            is_read INTEGER DEFAULT 0
        )",
        guard = if if_not_exists { "IF NOT EXISTS " } else { "" },
        table = table,
    )
}

/// Stored form of a creation time; fixed width so text order is time order
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse RFC 3339, falling back to naive ISO 8601 read as UTC
pub fn parse_timestamp(value: &str) -> CoordinatorResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| CoordinatorError::Timestamp {
            value: value.to_string(),
        })
}

/// Column values as read, before parsing
struct RawRow {
    id: i64,
    title: String,
    tags: String,
    content: Option<String>,
    seed: String,
    created_at: String,
    status: Option<String>,
    error_message: Option<String>,
    is_read: bool,
}

impl RawRow {
    fn from_record_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            tags: row.get(2)?,
            content: Some(row.get(3)?),
            seed: row.get(4)?,
            created_at: row.get(5)?,
            status: row.get(6)?,
            error_message: row.get(7)?,
            is_read: row.get::<_, Option<i64>>(8)?.unwrap_or(0) != 0,
        })
    }

    fn from_summary_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            tags: row.get(2)?,
            content: None,
            seed: row.get(3)?,
            created_at: row.get(4)?,
            status: row.get(5)?,
            error_message: row.get(6)?,
            is_read: row.get::<_, Option<i64>>(7)?.unwrap_or(0) != 0,
        })
    }

    fn status(&self) -> CoordinatorResult<ArticleStatus> {
        match self.status.as_deref() {
            Some(status) => Ok(status.parse()?),
            None => Ok(ArticleStatus::Completed),
        }
    }

    fn into_record(self) -> CoordinatorResult<ArticleRecord> {
        let status = self.status()?;
        Ok(ArticleRecord {
            id: self.id,
            created_at: parse_timestamp(&self.created_at)?,
            title: self.title,
            tags: self.tags,
            content: self.content.unwrap_or_default(),
            seed: self.seed,
            status,
            error_message: self.error_message,
            is_read: self.is_read,
        })
    }

    fn into_summary(self) -> CoordinatorResult<ArticleSummary> {
        let status = self.status()?;
        Ok(ArticleSummary {
            id: self.id,
            created_at: parse_timestamp(&self.created_at)?,
            tags: split_tags(&canonical_tags(&self.tags)),
            title: self.title,
            seed: self.seed,
            status,
            error_message: self.error_message,
            is_read: self.is_read,
        })
    }
}

/// Article store over a single SQLite connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    #[cfg(test)]
    rebuild_fault: Arc<std::sync::atomic::AtomicUsize>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: &Path) -> CoordinatorResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> CoordinatorResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CoordinatorResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            #[cfg(test)]
            rebuild_fault: Arc::new(std::sync::atomic::AtomicUsize::new(usize::MAX)),
        })
    }

    /// Make the next rebuilds fail after copying `rows` rows
    #[cfg(test)]
    pub(crate) fn fail_rebuild_after(&self, rows: usize) {
        self.rebuild_fault.store(rows, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn rebuild_fault_threshold(&self) -> usize {
        self.rebuild_fault.load(std::sync::atomic::Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    #[cfg(not(test))]
    fn rebuild_fault_threshold(&self) -> usize {
        usize::MAX
    }

    /// Insert with an explicit creation time
    pub async fn insert_article_at(&self, article: NewArticle, created_at: DateTime<Utc>) -> CoordinatorResult<i64> {
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO articles (title, tags, content, tag_seed, created_at, status, error_message, is_read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                params![
                    canonical_title(&article.title),
                    canonical_tag_list(&article.tags),
                    article.content,
                    article.seed,
                    format_timestamp(&created_at),
                    article.status.as_str(),
                    article.error_message,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Run blocking connection work off the async executor
    async fn with_connection<T, F>(&self, work: F) -> CoordinatorResult<T>
    where
        F: FnOnce(&mut Connection) -> CoordinatorResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| CoordinatorError::LockPoisoned {
                resource: "sqlite connection".to_string(),
            })?;
            work(&mut guard)
        })
        .await?
    }
}

fn init_schema(conn: &Connection) -> CoordinatorResult<()> {
    conn.execute_batch(&table_schema(ARTICLES_TABLE, true))?;

    // Older databases predate the read flag
    let has_read_flag = {
        let mut stmt = conn.prepare("PRAGMA table_info(articles)")?;
        let columns = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let mut found = false;
        for column in columns {
            if column? == "is_read" {
                found = true;
            }
        }
        found
    };
    if !has_read_flag {
        conn.execute_batch("ALTER TABLE articles ADD COLUMN is_read INTEGER DEFAULT 0")?;
    }

    for index in ARTICLE_INDEXES {
        conn.execute_batch(index)?;
    }
    Ok(())
}

fn scan_records(conn: &Connection) -> CoordinatorResult<Vec<ArticleRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM articles ORDER BY id ASC", RECORD_COLUMNS))?;
    let rows = stmt.query_map([], RawRow::from_record_row)?;
    let records = rows
        .map(|row| row?.into_record())
        .collect::<CoordinatorResult<Vec<_>>>()?;
    Ok(records)
}

/// Copy the live rows into the shadow table in the order of `ordering` and swap it in
///
/// `ordering` only fixes the sequence; field values are re-read inside the
/// transaction so writes made after the caller's scan are carried over.
fn rebuild_table(conn: &mut Connection, ordering: &[ArticleRecord], fault_after: usize) -> CoordinatorResult<u64> {
    let integrity = |e: rusqlite::Error| CoordinatorError::integrity("renumber", e);
    let tx = conn.transaction()?;

    let mut live: HashMap<i64, ArticleRecord> = scan_records(&tx)?
        .into_iter()
        .map(|record| (record.id, record))
        .collect();
    if live.len() != ordering.len() {
        return Err(CoordinatorError::integrity(
            "renumber",
            format!("collection changed: expected {} rows, found {}", ordering.len(), live.len()),
        ));
    }
    if ordering.is_empty() {
        return Ok(0);
    }

    let mut records = Vec::with_capacity(ordering.len());
    for expected in ordering {
        let record = live.remove(&expected.id).ok_or_else(|| {
            CoordinatorError::integrity("renumber", format!("collection changed: row {} is gone", expected.id))
        })?;
        records.push(record);
    }

    tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", SHADOW_TABLE))
        .map_err(integrity)?;
    tx.execute_batch(&table_schema(SHADOW_TABLE, false)).map_err(integrity)?;

    {
        let mut insert = tx
            .prepare(
                "INSERT INTO articles_new (id, title, tags, content, tag_seed, created_at, status, error_message, is_read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(integrity)?;

        for (position, record) in records.iter().enumerate() {
            if position >= fault_after {
                return Err(CoordinatorError::integrity("renumber", "injected fault while copying rows"));
            }
            insert
                .execute(params![
                    position as i64 + 1,
                    record.title,
                    record.tags,
                    record.content,
                    record.seed,
                    format_timestamp(&record.created_at),
                    record.status.as_str(),
                    record.error_message,
                    record.is_read as i64,
                ])
                .map_err(integrity)?;
        }
    }

    tx.execute_batch(&format!(
        "DROP TABLE {live}; ALTER TABLE {shadow} RENAME TO {live};",
        live = ARTICLES_TABLE,
        shadow = SHADOW_TABLE
    ))
    .map_err(integrity)?;
    for index in ARTICLE_INDEXES {
        tx.execute_batch(index).map_err(integrity)?;
    }
    tx.execute(
        "DELETE FROM sqlite_sequence WHERE name IN (?1, ?2)",
        params![ARTICLES_TABLE, SHADOW_TABLE],
    )
    .map_err(integrity)?;
    tx.execute(
        "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
        params![ARTICLES_TABLE, records.len() as i64],
    )
    .map_err(integrity)?;

    tx.commit().map_err(integrity)?;
    Ok(records.len() as u64)
}

fn query_page(conn: &Connection, query: &ArticleQuery) -> CoordinatorResult<ArticlePage> {
    let page = query.page.max(1);
    let per_page = query.per_page.max(1);

    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    match query.read_filter {
        ReadFilter::Read => clauses.push("is_read = 1"),
        ReadFilter::Unread => clauses.push("is_read = 0"),
        ReadFilter::All => {}
    }
    if !query.title_search.is_empty() {
        clauses.push("title LIKE ?");
        values.push(format!("%{}%", query.title_search));
    }
    if !query.tag_search.is_empty() {
        clauses.push("tags LIKE ?");
        values.push(format!("%{}%", query.tag_search));
    }
    match query.status_filter {
        StatusFilter::Completed => clauses.push("status = 'completed'"),
        StatusFilter::Failed => clauses.push("status = 'failed'"),
        StatusFilter::All => {}
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM articles {}", where_clause),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    // Sort column and direction come from closed enums
    let sql = format!(
        "SELECT {columns} FROM articles {where_clause} ORDER BY {field} {order}, id {order} LIMIT {limit} OFFSET {offset}",
        columns = SUMMARY_COLUMNS,
        where_clause = where_clause,
        field = query.sort_field.column(),
        order = query.sort_order.keyword(),
        limit = per_page,
        offset = (page as u64 - 1) * per_page as u64,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), RawRow::from_summary_row)?;
    let articles = rows
        .map(|row| row?.into_summary())
        .collect::<CoordinatorResult<Vec<_>>>()?;

    let total_count = total_count.max(0) as u64;
    Ok(ArticlePage {
        articles,
        total_count,
        page,
        per_page,
        total_pages: total_count.div_ceil(per_page as u64),
    })
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn insert_article(&self, article: NewArticle) -> CoordinatorResult<i64> {
        self.insert_article_at(article, Utc::now()).await
    }

    async fn title_exists(&self, title: &str) -> CoordinatorResult<bool> {
        let title = title.to_string();
        self.with_connection(move |conn| {
            let found = conn
                .query_row("SELECT id FROM articles WHERE title = ?1 LIMIT 1", params![title], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> CoordinatorResult<Option<ArticleRecord>> {
        self.with_connection(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {} FROM articles WHERE id = ?1", RECORD_COLUMNS),
                    params![id],
                    RawRow::from_record_row,
                )
                .optional()?;
            raw.map(RawRow::into_record).transpose()
        })
        .await
    }

    async fn delete_by_id(&self, id: i64) -> CoordinatorResult<bool> {
        self.with_connection(move |conn| Ok(conn.execute("DELETE FROM articles WHERE id = ?1", params![id])? > 0))
            .await
    }

    async fn delete_all(&self) -> CoordinatorResult<u64> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM articles", [])?;
            tx.execute("DELETE FROM sqlite_sequence WHERE name = ?1", params![ARTICLES_TABLE])?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
    }

    async fn toggle_read(&self, id: i64) -> CoordinatorResult<bool> {
        self.with_connection(move |conn| {
            let changed = conn.execute(
                "UPDATE articles SET is_read = CASE WHEN is_read = 1 THEN 0 ELSE 1 END WHERE id = ?1",
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn count(&self) -> CoordinatorResult<u64> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn scan_all(&self) -> CoordinatorResult<Vec<ArticleRecord>> {
        self.with_connection(|conn| scan_records(conn)).await
    }

    async fn paginated_query(&self, query: ArticleQuery) -> CoordinatorResult<ArticlePage> {
        self.with_connection(move |conn| query_page(conn, &query)).await
    }

    async fn delete_batch(&self, ids: Vec<i64>) -> CoordinatorResult<u64> {
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0u64;
            {
                let mut delete = tx.prepare("DELETE FROM articles WHERE id = ?1")?;
                for id in &ids {
                    removed += delete.execute(params![id])? as u64;
                }
            }
            tx.commit()?;
            debug!("Deleted {} of {} requested rows", removed, ids.len());
            Ok(removed)
        })
        .await
    }

    async fn update_fields_batch(&self, updates: Vec<FieldUpdate>) -> CoordinatorResult<u64> {
        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0u64;
            {
                let mut update = tx.prepare("UPDATE articles SET title = ?1, tags = ?2 WHERE id = ?3")?;
                for field in &updates {
                    changed += update.execute(params![field.title, field.tags, field.id])? as u64;
                }
            }
            tx.commit()?;
            Ok(changed)
        })
        .await
    }

    async fn rebuild_in_order(&self, records: Vec<ArticleRecord>) -> CoordinatorResult<u64> {
        let fault_after = self.rebuild_fault_threshold();
        self.with_connection(move |conn| rebuild_table(conn, &records, fault_after))
            .await
    }
}
