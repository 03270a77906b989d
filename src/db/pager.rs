//! Count-then-window pagination over raw SQL.
//!
//! A [`Pager`] wraps the caller's SQL as a subquery to count the matching
//! rows, works out the page layout, and prepares a windowed copy of the SQL
//! for the requested page:
//!
//! ```text
//! select count(1) counts from (<sql>
//! ) c                                  -- step 1, run immediately
//! <sql>
//! limit <offset>,<page_size>           -- step 2, run by scan()
//! ```
//!
//! Generated clauses always start on a new line after the caller's SQL.
//! When every row fits on one page the original SQL is used as-is.
//!
//! The two round trips are not run inside a transaction. Rows written
//! between the count and the data query can shift page boundaries.

use crate::db::params::{mysql_query, postgres_query, sqlite_query};
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{Dialect, QueryParam};
use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Page size used when the caller passes a size of zero or less, unless
/// overridden with [`set_default_page_size`].
pub const DEFAULT_PAGE_SIZE: i64 = 10;

static PAGE_SIZE: AtomicI64 = AtomicI64::new(DEFAULT_PAGE_SIZE);

/// Current process-wide default page size.
pub fn default_page_size() -> i64 {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Override the process-wide default page size.
///
/// Only affects pagers created afterwards.
pub fn set_default_page_size(size: i64) -> DbResult<()> {
    if size <= 0 {
        return Err(DbError::invalid_input(format!(
            "Default page size must be greater than 0, got {}",
            size
        )));
    }
    PAGE_SIZE.store(size, Ordering::Relaxed);
    Ok(())
}

/// Row types a pager can decode on every supported backend.
///
/// `#[derive(sqlx::FromRow)]` structs satisfy this as long as each field
/// type decodes on MySQL, PostgreSQL and SQLite.
pub trait FromDbRow:
    for<'r> FromRow<'r, MySqlRow>
    + for<'r> FromRow<'r, PgRow>
    + for<'r> FromRow<'r, SqliteRow>
    + Send
    + Unpin
{
}

impl<T> FromDbRow for T where
    T: for<'r> FromRow<'r, MySqlRow>
        + for<'r> FromRow<'r, PgRow>
        + for<'r> FromRow<'r, SqliteRow>
        + Send
        + Unpin
{
}

/// Destination of the count query.
#[derive(Debug, sqlx::FromRow)]
struct RowCount {
    counts: i64,
}

/// Page arithmetic for a known row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    /// Effective page, 1-based. Zero only when there are no rows.
    pub page: i64,
    pub page_size: i64,
    pub total_rows: i64,
    pub total_pages: i64,
}

impl PageWindow {
    /// Lay out `total_rows` in pages of `page_size` and clamp the requested
    /// page into range.
    ///
    /// Inputs are normalised the same way [`Pager::new`] does it.
    pub fn compute(total_rows: i64, requested_page: i64, page_size: i64) -> Self {
        let page_size = if page_size <= 0 {
            default_page_size()
        } else {
            page_size
        };
        let requested_page = requested_page.max(1);

        if total_rows <= 0 {
            return Self {
                page: requested_page,
                page_size,
                total_rows: 0,
                total_pages: 0,
            };
        }

        let mut total_pages = total_rows / page_size;
        if total_rows % page_size != 0 {
            total_pages += 1;
        }

        Self {
            page: requested_page.min(total_pages),
            page_size,
            total_rows,
            total_pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows == 0
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        (self.page - 1) * self.page_size
    }

    /// Whether the data query needs a LIMIT clause. False when every row
    /// fits on a single page.
    pub fn needs_limit(&self) -> bool {
        self.total_rows > self.page_size
    }

    /// Number of rows the data query returns for this page.
    pub fn rows_on_page(&self) -> i64 {
        (self.total_rows - self.offset()).clamp(0, self.page_size)
    }

    /// Render the data query for `sql` in the given dialect.
    pub fn windowed_sql(&self, dialect: Dialect, sql: &str) -> String {
        if !self.needs_limit() {
            return sql.to_string();
        }
        match dialect {
            Dialect::MySql | Dialect::Sqlite => {
                format!("{}\nlimit {},{}", sql, self.offset(), self.page_size)
            }
            Dialect::Postgres => {
                format!("{}\nlimit {} offset {}", sql, self.page_size, self.offset())
            }
        }
    }
}

/// Wrap `sql` in a row-counting query.
pub fn count_sql(sql: &str) -> String {
    format!("select count(1) counts from ({}\n) c ", sql)
}

/// Strip trailing whitespace and statement terminators so the SQL can be
/// nested in a subquery or extended with a LIMIT clause.
fn trim_statement(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Snapshot of a pager's state, e.g. for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_rows: i64,
    pub offset: i64,
    pub rows_on_page: i64,
}

#[derive(Debug, Clone)]
struct PreparedQuery {
    sql: String,
    params: Vec<QueryParam>,
}

/// Paginates one raw SQL query.
///
/// Create one per query: [`new`](Self::new), then
/// [`with_query`](Self::with_query) to count and prepare the window, then
/// [`scan`](Self::scan) to fetch the page. Not meant to be shared between
/// tasks.
///
/// ```ignore
/// let users: Vec<User> = Pager::new(pool, 2, 20)
///     .with_query("select id, name from users where active = ? order by id", vec![true.into()])
///     .await?
///     .scan()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Pager {
    pool: DbPool,
    window: PageWindow,
    prepared: Option<PreparedQuery>,
}

impl Pager {
    /// Create a pager. Pages below 1 become 1 and sizes of zero or less use
    /// [`default_page_size`]. No I/O happens here.
    pub fn new(pool: DbPool, page: i64, page_size: i64) -> Self {
        let window = PageWindow::compute(0, page, page_size);
        Self {
            pool,
            window,
            prepared: None,
        }
    }

    /// Count the rows of `sql` and prepare the query for the requested page.
    ///
    /// `params` are bound to both the count and the data query. Driver
    /// errors from the count query are returned unchanged.
    pub async fn with_query(
        mut self,
        sql: impl AsRef<str>,
        params: Vec<QueryParam>,
    ) -> DbResult<Self> {
        let sql = trim_statement(sql.as_ref());
        self.prepared = None;
        self.window = PageWindow::compute(0, self.window.page, self.window.page_size);

        let total_rows = self.count_rows(sql, &params).await?;
        self.window = PageWindow::compute(total_rows, self.window.page, self.window.page_size);

        debug!(
            total_rows = self.window.total_rows,
            total_pages = self.window.total_pages,
            page = self.window.page,
            page_size = self.window.page_size,
            "Counted paged query"
        );

        if self.window.is_empty() {
            return Ok(self);
        }

        let data_sql = self.window.windowed_sql(self.pool.dialect(), sql);
        debug!(sql = %data_sql, offset = self.window.offset(), "Prepared page query");
        self.prepared = Some(PreparedQuery {
            sql: data_sql,
            params,
        });
        Ok(self)
    }

    /// Fetch the prepared page.
    ///
    /// Fails with [`DbError::NoRows`] when the count found nothing, without
    /// touching the database. Driver errors are returned unchanged.
    pub async fn scan<T: FromDbRow>(&self) -> DbResult<Vec<T>> {
        let prepared = match &self.prepared {
            Some(prepared) if !self.window.is_empty() => prepared,
            _ => return Err(DbError::NoRows),
        };

        debug!(
            sql = %prepared.sql,
            params = prepared.params.len(),
            "Fetching page"
        );

        let sql = prepared.sql.as_str();
        let params = prepared.params.as_slice();
        let rows = impl_db_dispatch!(&self.pool, {
            MySql(p) => decode_rows(&mysql_query(sql, params).fetch_all(p).await?)?,
            Postgres(p) => decode_rows(&postgres_query(sql, params).fetch_all(p).await?)?,
            SQLite(p) => decode_rows(&sqlite_query(sql, params).fetch_all(p).await?)?,
        });
        Ok(rows)
    }

    async fn count_rows(&self, sql: &str, params: &[QueryParam]) -> DbResult<i64> {
        let count_sql = count_sql(sql);
        debug!(sql = %count_sql, params = params.len(), "Counting rows");

        let count: RowCount = impl_db_dispatch!(&self.pool, {
            MySql(p) => RowCount::from_row(&mysql_query(&count_sql, params).fetch_one(p).await?)?,
            Postgres(p) => RowCount::from_row(&postgres_query(&count_sql, params).fetch_one(p).await?)?,
            SQLite(p) => RowCount::from_row(&sqlite_query(&count_sql, params).fetch_one(p).await?)?,
        });
        Ok(count.counts)
    }

    /// Effective page number (1-based; clamped once rows are counted).
    pub fn page(&self) -> i64 {
        self.window.page
    }

    pub fn page_size(&self) -> i64 {
        self.window.page_size
    }

    /// Zero until [`with_query`](Self::with_query) has run.
    pub fn total_pages(&self) -> i64 {
        self.window.total_pages
    }

    /// Zero until [`with_query`](Self::with_query) has run.
    pub fn total_rows(&self) -> i64 {
        self.window.total_rows
    }

    pub fn offset(&self) -> i64 {
        self.window.offset()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// SQL that [`scan`](Self::scan) will run, if a page was prepared.
    pub fn data_sql(&self) -> Option<&str> {
        self.prepared.as_ref().map(|p| p.sql.as_str())
    }

    pub fn info(&self) -> PageInfo {
        PageInfo {
            page: self.window.page,
            page_size: self.window.page_size,
            total_pages: self.window.total_pages,
            total_rows: self.window.total_rows,
            offset: self.window.offset(),
            rows_on_page: self.window.rows_on_page(),
        }
    }
}

fn decode_rows<R: Row, T>(rows: &[R]) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, R>,
{
    rows.iter().map(|row| T::from_row(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(PageWindow::compute(25, 1, 10).total_pages, 3);
        assert_eq!(PageWindow::compute(20, 1, 10).total_pages, 2);
        assert_eq!(PageWindow::compute(21, 1, 10).total_pages, 3);
        assert_eq!(PageWindow::compute(1, 1, 10).total_pages, 1);
    }

    #[test]
    fn test_page_clamped_to_last_page() {
        let window = PageWindow::compute(25, 99, 10);
        assert_eq!(window.page, 3);
        assert_eq!(window.offset(), 20);
        assert_eq!(window.rows_on_page(), 5);
    }

    #[test]
    fn test_page_below_one_clamped_up() {
        for requested in [0, -1, i64::MIN] {
            let window = PageWindow::compute(25, requested, 10);
            assert_eq!(window.page, 1);
            assert_eq!(window.offset(), 0);
        }
    }

    #[test]
    fn test_non_positive_page_size_uses_default() {
        for size in [0, -5] {
            let window = PageWindow::compute(25, 1, size);
            assert_eq!(window.page_size, default_page_size());
        }
    }

    #[test]
    fn test_empty_window() {
        let window = PageWindow::compute(0, 4, 10);
        assert!(window.is_empty());
        assert_eq!(window.total_pages, 0);
        assert_eq!(window.offset(), 0);
        assert_eq!(window.rows_on_page(), 0);
    }

    #[test]
    fn test_single_page_keeps_sql_unmodified() {
        let sql = "select id from users order by id";
        for total in [1, 9, 10] {
            let window = PageWindow::compute(total, 1, 10);
            assert_eq!(window.total_pages, 1);
            assert!(!window.needs_limit());
            assert_eq!(window.windowed_sql(Dialect::MySql, sql), sql);
        }
    }

    #[test]
    fn test_single_page_clamps_requested_page() {
        let window = PageWindow::compute(7, 5, 10);
        assert_eq!(window.page, 1);
        assert_eq!(window.offset(), 0);
    }

    #[test]
    fn test_windowed_sql_mysql_and_sqlite() {
        let window = PageWindow::compute(25, 2, 10);
        assert_eq!(
            window.windowed_sql(Dialect::MySql, "select * from t"),
            "select * from t\nlimit 10,10"
        );
        assert_eq!(
            window.windowed_sql(Dialect::Sqlite, "select * from t"),
            "select * from t\nlimit 10,10"
        );
    }

    #[test]
    fn test_windowed_sql_postgres() {
        let window = PageWindow::compute(25, 3, 10);
        assert_eq!(
            window.windowed_sql(Dialect::Postgres, "select * from t"),
            "select * from t\nlimit 10 offset 20"
        );
    }

    #[test]
    fn test_count_sql() {
        assert_eq!(
            count_sql("select * from t where a = ?"),
            "select count(1) counts from (select * from t where a = ?\n) c "
        );
    }

    #[test]
    fn test_trim_statement() {
        assert_eq!(trim_statement("select 1;  \n"), "select 1");
        assert_eq!(trim_statement("select 1"), "select 1");
        assert_eq!(trim_statement("select 1 ;;"), "select 1");
    }

    #[test]
    fn test_set_default_page_size_rejects_non_positive() {
        assert!(matches!(
            set_default_page_size(0),
            Err(DbError::InvalidInput { .. })
        ));
        assert!(set_default_page_size(-3).is_err());
    }

    #[test]
    fn test_pages_cover_all_rows_once() {
        let total = 47;
        let size = 10;
        let pages = PageWindow::compute(total, 1, size).total_pages;
        let covered: i64 = (1..=pages)
            .map(|page| PageWindow::compute(total, page, size).rows_on_page())
            .sum();
        assert_eq!(covered, total);
    }
}
