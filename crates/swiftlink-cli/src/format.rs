//! Display helpers for terminal output.

use chrono::{DateTime, Local, Utc};

use swiftlink_core::models::Link;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a timestamp as a local calendar date
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%b %d, %Y").to_string()
}

/// Format a timestamp as local date and time
pub fn format_datetime(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string()
}

pub fn format_clicks(count: usize) -> String {
    if count == 1 {
        "1 click".to_string()
    } else {
        format!("{} clicks", count)
    }
}

/// Column widths for the link table
const CODE_WIDTH: usize = 10;
const URL_WIDTH: usize = 48;

pub fn link_table_header() -> String {
    format!(
        "{:<code$}  {:<url$}  {:>10}  {:<12}  {}",
        "CODE",
        "URL",
        "CLICKS",
        "CREATED",
        "STATUS",
        code = CODE_WIDTH,
        url = URL_WIDTH,
    )
}

pub fn link_table_row(link: &Link) -> String {
    let status = if link.revoked { "revoked" } else { "active" };
    format!(
        "{:<code$}  {:<url$}  {:>10}  {:<12}  {}",
        truncate_string(&link.code, CODE_WIDTH),
        truncate_string(&link.url, URL_WIDTH),
        link.click_count(),
        format_date(&link.created_at),
        status,
        code = CODE_WIDTH,
        url = URL_WIDTH,
    )
}
