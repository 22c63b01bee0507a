use chrono::{DateTime, Utc};

/// Visible characters kept at each end of a masked token
const MASK_KEEP: usize = 6;

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

/// Show only the ends of a token, e.g. `eyJhbG...9xQk2c`
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= MASK_KEEP * 2 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..MASK_KEEP].iter().collect();
    let tail: String = chars[chars.len() - MASK_KEEP..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Format an optional timestamp for display
pub fn format_datetime(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.format("%b %d, %Y %H:%M UTC").to_string(),
        None => "-".to_string(),
    }
}

/// "just now", "12 min ago", "3 h ago", "2 days ago"
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    match minutes {
        m if m < 1 => "just now".to_string(),
        m if m < 60 => format!("{} min ago", m),
        m if m < 60 * 24 => format!("{} h ago", m / 60),
        m => {
            let days = m / (60 * 24);
            if days == 1 {
                "1 day ago".to_string()
            } else {
                format!("{} days ago", days)
            }
        }
    }
}

/// Seconds as `45s` or `1m 05s`
pub fn format_countdown(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}
