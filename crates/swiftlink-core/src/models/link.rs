use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

/// A single visit to a short link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Click {
    pub ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub code: String,
    pub url: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub clicks: Option<Vec<Click>>,
}

impl Link {
    pub fn click_count(&self) -> usize {
        self.clicks.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        !self.revoked
    }
}

/// `{origin}/r/{code}`, tolerating a trailing slash on the origin.
pub fn short_url(origin: &str, code: &str) -> String {
    format!("{}/r/{}", origin.trim_end_matches('/'), code)
}

/// Case-insensitive search over link codes and target URLs.
/// An empty query keeps everything.
pub fn filter_links<'a>(links: &'a [Link], query: &str) -> Vec<&'a Link> {
    let query = query.trim().to_lowercase();
    links
        .iter()
        .filter(|link| {
            query.is_empty()
                || link.code.to_lowercase().contains(&query)
                || link.url.to_lowercase().contains(&query)
        })
        .collect()
}

/// Dashboard totals for a set of links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub total_links: usize,
    pub active_links: usize,
    pub total_clicks: usize,
}

impl LinkStats {
    pub fn from_links(links: &[Link]) -> Self {
        links.iter().fold(Self::default(), |mut stats, link| {
            stats.total_links += 1;
            if link.is_active() {
                stats.active_links += 1;
            }
            stats.total_clicks += link.click_count();
            stats
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLinkRequest<'a> {
    pub url: &'a str,
}

/// `{ "data": ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// `{ "message": ..., "data": ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEnvelope<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
