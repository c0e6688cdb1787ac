use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    allocator::CodeRegistry,
    error::{is_unique_violation, Error, Result},
    models::{Click, Link, LinkUpdate, NewClick},
};

const LINK_COLUMNS: &str =
    "id, short_code, original_url, description, created_at, click_count, last_clicked, is_active";

// ── Pool ───────────────────────────────────────────────────────────────────

/// Open (creating if needed) the SQLite database at `database_url` and apply
/// the embedded migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?;
    connect_with(options, max_connections).await
}

pub async fn connect_with(
    options: SqliteConnectOptions,
    max_connections: u32,
) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(
            options
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(5)),
        )
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

// ── Links ──────────────────────────────────────────────────────────────────

/// Insert a new link and return the newly created row.
///
/// The UNIQUE index on `short_code` is the final authority on collisions: a
/// code claimed between allocation and this insert yields
/// [`Error::DuplicateCode`] and nothing is written.
pub async fn create_link(
    pool: &SqlitePool,
    short_code: &str,
    original_url: &str,
    description: Option<&str>,
) -> Result<Link> {
    let inserted = sqlx::query(
        "INSERT INTO urls (short_code, original_url, description, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(short_code)
    .bind(original_url)
    .bind(description)
    .bind(Utc::now())
    .execute(pool)
    .await;

    let id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(Error::DuplicateCode(short_code.to_owned()));
        }
        Err(e) => return Err(e.into()),
    };

    let link: Link = sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM urls WHERE id = ?1"))
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(link)
}

/// Fetch a link by its short code. Inactive links are only returned when
/// `include_inactive` is set.
pub async fn get_link_by_code(
    pool: &SqlitePool,
    short_code: &str,
    include_inactive: bool,
) -> Result<Option<Link>> {
    let sql = if include_inactive {
        format!("SELECT {LINK_COLUMNS} FROM urls WHERE short_code = ?1")
    } else {
        format!("SELECT {LINK_COLUMNS} FROM urls WHERE short_code = ?1 AND is_active = 1")
    };

    let link: Option<Link> = sqlx::query_as(&sql)
        .bind(short_code)
        .fetch_optional(pool)
        .await?;

    Ok(link)
}

/// Whether any link, active or not, already holds `short_code`.
pub async fn code_exists(pool: &SqlitePool, short_code: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM urls WHERE short_code = ?1)")
            .bind(short_code)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}

/// Change a link's description and/or active flag. Returns `None` for an
/// unknown code.
pub async fn update_link(
    pool: &SqlitePool,
    short_code: &str,
    update: &LinkUpdate,
) -> Result<Option<Link>> {
    let description = update
        .description
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let affected = sqlx::query(
        "UPDATE urls
         SET description = CASE WHEN ?1 THEN ?2 ELSE description END,
             is_active = COALESCE(?3, is_active)
         WHERE short_code = ?4",
    )
    .bind(update.description.is_some())
    .bind(description)
    .bind(update.is_active)
    .bind(short_code)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    get_link_by_code(pool, short_code, true).await
}

#[async_trait]
impl CodeRegistry for SqlitePool {
    async fn code_exists(&self, short_code: &str) -> Result<bool> {
        code_exists(self, short_code).await
    }
}

// ── Clicks ─────────────────────────────────────────────────────────────────

/// Record one visit to an active link.
///
/// The counter bump and the click row are written in one transaction, so
/// `click_count` always equals the number of stored clicks. The `UPDATE`
/// runs first and takes SQLite's write lock, which serializes concurrent
/// clicks on the same database. An unknown or inactive link rolls the
/// transaction back and yields [`Error::NotFound`].
pub async fn record_click(pool: &SqlitePool, link_id: i64, click: &NewClick) -> Result<Click> {
    let clicked_at = Utc::now();

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE urls
         SET click_count = click_count + 1,
             last_clicked = CASE
                 WHEN last_clicked IS NULL OR last_clicked < ?1 THEN ?1
                 ELSE last_clicked
             END
         WHERE id = ?2 AND is_active = 1",
    )
    .bind(clicked_at)
    .bind(link_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        // Dropping `tx` rolls back.
        return Err(Error::NotFound);
    }

    let id = sqlx::query(
        "INSERT INTO clicks (url_id, ip_address, user_agent, referrer, country, clicked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(link_id)
    .bind(click.ip_address.as_deref())
    .bind(click.user_agent.as_deref())
    .bind(click.referrer.as_deref())
    .bind(click.country.as_deref())
    .bind(clicked_at)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(Click {
        id,
        url_id: link_id,
        ip_address: click.ip_address.clone(),
        user_agent: click.user_agent.clone(),
        referrer: click.referrer.clone(),
        country: click.country.clone(),
        clicked_at,
    })
}

/// Every click recorded for a link, newest first.
pub async fn clicks_for_link(pool: &SqlitePool, link_id: i64) -> Result<Vec<Click>> {
    let clicks: Vec<Click> = sqlx::query_as(
        "SELECT id, url_id, ip_address, user_agent, referrer, country, clicked_at
         FROM clicks
         WHERE url_id = ?1
         ORDER BY clicked_at DESC, id DESC",
    )
    .bind(link_id)
    .fetch_all(pool)
    .await?;

    Ok(clicks)
}

/// Number of click rows stored for a link.
pub async fn count_clicks(pool: &SqlitePool, link_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks WHERE url_id = ?1")
        .bind(link_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
