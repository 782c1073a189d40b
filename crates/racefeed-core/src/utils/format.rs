use chrono::{DateTime, Utc};

use crate::models::entity::CREDENTIAL_PARAM;

/// Human readable age of a timestamp relative to `now` ("5m ago", "3h ago").
pub fn age_display(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Truncate a string to `max_len` bytes (on a char boundary), adding a marker.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &s[..end], s.len())
}

/// Replace the credential query parameter in a URL so it can be logged.
pub fn redact_credential(url: &str) -> String {
    let marker = format!("{}=", CREDENTIAL_PARAM);
    let Some((path, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query = query
        .split('&')
        .map(|pair| {
            if pair.starts_with(&marker) {
                format!("{}***", marker)
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}
