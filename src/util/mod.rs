use chrono::{DateTime, Utc};

/// Single-line preview of free text, cut to `size` characters
pub fn clip(text: Option<&str>, size: usize) -> String {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return String::new();
    };

    let compact = text.replace('\n', "\\n");
    match compact.char_indices().nth(size) {
        Some((cut, _)) => format!("{}...", &compact[..cut]),
        None => compact,
    }
}

pub fn fmt_dt(dt: Option<DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "?".to_string(),
    }
}

pub fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Y",
        Some(false) => "N",
        None => "?",
    }
}
