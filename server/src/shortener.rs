//! Create, resolve and report on short links.
//!
//! These functions compose the code allocator with the SQLite store. Each
//! takes the pool explicitly; none of them keeps state of its own.

use sqlx::SqlitePool;
use url::Url;

use crate::{
    allocator::{normalize_alias, CodeAllocator, CodeRegistry, CodeSource},
    db,
    error::{Error, Result},
    geo::GeoLocator,
    models::{Click, CreateLink, Link, LinkStats, NewClick},
    stats,
};

/// Create a link, honouring `input.custom_alias` when present.
///
/// A generated code that loses an insert race is re-allocated once. An
/// explicit alias that loses the race is reported as
/// [`Error::AliasConflict`] straight away.
pub async fn create_link<S: CodeSource>(
    pool: &SqlitePool,
    allocator: &CodeAllocator<S>,
    input: &CreateLink,
) -> Result<Link> {
    create_with_registry(pool, pool, allocator, input).await
}

pub(crate) async fn create_with_registry<S, R>(
    pool: &SqlitePool,
    registry: &R,
    allocator: &CodeAllocator<S>,
    input: &CreateLink,
) -> Result<Link>
where
    S: CodeSource,
    R: CodeRegistry + ?Sized,
{
    let original_url = validate_url(&input.original_url)?;
    let alias = normalize_alias(input.custom_alias.as_deref())?;
    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let link = if let Some(alias) = alias {
        let code = allocator.allocate(registry, Some(&alias)).await?;
        match db::create_link(pool, &code, &original_url, description).await {
            Err(Error::DuplicateCode(code)) => return Err(Error::AliasConflict(code)),
            other => other?,
        }
    } else {
        let code = allocator.allocate(registry, None).await?;
        match db::create_link(pool, &code, &original_url, description).await {
            Err(Error::DuplicateCode(lost)) => {
                tracing::warn!("Short code '{}' was claimed concurrently, re-allocating", lost);
                let retry = allocator.allocate(registry, None).await?;
                db::create_link(pool, &retry, &original_url, description).await?
            }
            other => other?,
        }
    };

    tracing::info!("Created short link '{}' -> {}", link.short_code, link.original_url);
    Ok(link)
}

/// Look up an active link and record the visit.
///
/// The visitor's country is only looked up once the link is known to be
/// active, so unknown codes never reach the geo service. Returns the link as
/// it was before the click together with the stored click event.
pub async fn resolve(
    pool: &SqlitePool,
    geo: &GeoLocator,
    short_code: &str,
    mut visit: NewClick,
) -> Result<(Link, Click)> {
    let link = db::get_link_by_code(pool, short_code, false)
        .await?
        .ok_or(Error::NotFound)?;

    if visit.country.is_none() {
        if let Some(ip) = visit.ip_address.as_deref() {
            visit.country = geo.country(ip).await;
        }
    }

    let click = db::record_click(pool, link.id, &visit).await?;
    Ok((link, click))
}

/// Load a link (active or not) and aggregate its full click history.
pub async fn get_stats(pool: &SqlitePool, short_code: &str) -> Result<LinkStats> {
    let link = db::get_link_by_code(pool, short_code, true)
        .await?
        .ok_or(Error::NotFound)?;

    let clicks = db::clicks_for_link(pool, link.id).await?;
    let breakdown = stats::summarize(&clicks);

    Ok(LinkStats { link, breakdown })
}

/// Trim `raw` and require an absolute http(s) URL.
pub fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("Original URL is required".into()));
    }

    let parsed =
        Url::parse(trimmed).map_err(|_| Error::InvalidInput("Invalid URL format".into()))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(Error::InvalidInput(
            "URL must start with http:// or https://".into(),
        ));
    }

    Ok(trimmed.to_owned())
}
