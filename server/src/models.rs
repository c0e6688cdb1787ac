use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shortened link record from the `urls` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub click_count: i64,
    pub last_clicked: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A single click event from the `clicks` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Click {
    pub id: i64,
    pub url_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub clicked_at: DateTime<Utc>,
}

/// Request metadata captured when a visitor follows a short link.
#[derive(Debug, Clone, Default)]
pub struct NewClick {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
}

/// Mutable fields of a link. `None` leaves a field untouched; an empty
/// description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkUpdate {
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Body of `POST /api/urls`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLink {
    #[serde(default)]
    pub original_url: String,
    pub custom_alias: Option<String>,
    pub description: Option<String>,
}

/// Click history folded into per-dimension counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickBreakdown {
    pub unique_clicks: i64,
    pub devices: BTreeMap<String, i64>,
    pub referrers: BTreeMap<String, i64>,
    pub browsers: BTreeMap<String, i64>,
    pub operating_systems: BTreeMap<String, i64>,
    pub countries: BTreeMap<String, i64>,
}

/// A link together with its aggregated click history.
#[derive(Debug, Clone)]
pub struct LinkStats {
    pub link: Link,
    pub breakdown: ClickBreakdown,
}

/// Link as returned over the API, including its public short URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub id: i64,
    pub short_code: String,
    pub short_url: String,
    pub original_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub click_count: i64,
    pub last_clicked: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl LinkResponse {
    pub fn new(link: Link, short_url: String) -> Self {
        Self {
            id: link.id,
            short_code: link.short_code,
            short_url,
            original_url: link.original_url,
            description: link.description,
            created_at: link.created_at,
            click_count: link.click_count,
            last_clicked: link.last_clicked,
            is_active: link.is_active,
        }
    }
}

/// Body of `GET /api/urls/:code/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub link: LinkResponse,
    #[serde(flatten)]
    pub breakdown: ClickBreakdown,
}
