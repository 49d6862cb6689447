//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use uuid::Uuid;

/// Generate a new UUID v4
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Format a timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Random identifier of upper-case letters and digits, used for reservation codes
pub fn generate_random_id(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Spreadsheet style column name: 1 -> A, 27 -> AA
pub fn number_to_excel_column(mut n: u32) -> String {
    let mut column = String::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        column.insert(0, (b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    column
}

/// Calculate pagination offset
pub fn calculate_offset(page: i64, page_size: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(page_size)
}

/// Number of pages needed to show `total_items`
pub fn total_pages(total_items: i64, page_size: i64) -> i64 {
    if page_size <= 0 {
        return 0;
    }
    total_items.saturating_add(page_size - 1) / page_size
}

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").ok())
        .as_ref()
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email))
}

/// Phone numbers are stored as digits only and must have at least 9 of them
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() >= 9 && phone.chars().all(|c| c.is_ascii_digit())
}

/// Slovak organisation identifier: exactly 8 digits
pub fn is_valid_ico(ico: &str) -> bool {
    ico.len() == 8 && ico.chars().all(|c| c.is_ascii_digit())
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Quote a CSV field when it contains separators, quotes or line breaks
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a JSON scalar as a CSV cell
pub fn json_to_csv_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => csv_escape(s),
        other => csv_escape(&other.to_string()),
    }
}

/// Render a list of JSON objects as CSV. Columns follow first appearance.
pub fn json_rows_to_csv(rows: &[serde_json::Value]) -> String {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for key in obj.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut out = columns.iter().map(|c| csv_escape(c)).collect::<Vec<_>>().join(",");
    out.push('\n');
    for row in rows {
        let line = columns
            .iter()
            .map(|c| row.get(c).map(json_to_csv_cell).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Approximate distance in miles between two coordinates (flat earth
/// approximation matching the SQL radius filter)
pub fn approximate_distance_miles(lat: f64, lon: f64, lat0: f64, lon0: f64) -> f64 {
    let dy = 69.1 * (lat - lat0);
    let dx = 69.1 * (lon0 - lon) * (lat / 57.3).cos();
    (dx * dx + dy * dy).sqrt()
}

/// Keys whose values differ between two JSON objects
pub fn find_diff_keys(old: &serde_json::Value, new: &serde_json::Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let old = old.as_object().unwrap_or(&empty);
    let new = new.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| old.get(*k) != new.get(*k))
        .cloned()
        .collect()
}

/// Truncate text to a maximum length with ellipsis
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_length.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_generate_random_id() {
        let id = generate_random_id(9);
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_number_to_excel_column() {
        assert_eq!(number_to_excel_column(1), "A");
        assert_eq!(number_to_excel_column(26), "Z");
        assert_eq!(number_to_excel_column(27), "AA");
        assert_eq!(number_to_excel_column(702), "ZZ");
        assert_eq!(number_to_excel_column(703), "AAA");
    }

    #[test]
    fn test_pagination_math() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(calculate_offset(1, 10), 0);
        assert_eq!(calculate_offset(3, 10), 20);
        assert_eq!(calculate_offset(0, 10), 0);
        assert_eq!(calculate_offset(i64::MAX, 2), i64::MAX);
    }

    #[test]
    fn test_validators() {
        assert!(is_valid_email("teacher@school.sk"));
        assert!(!is_valid_email("teacher@school"));
        assert!(is_valid_phone("421900123456"));
        assert!(!is_valid_phone("+421 900"));
        assert!(is_valid_ico("12345678"));
        assert!(!is_valid_ico("1234567"));
        assert!(!is_valid_ico("1234567a"));
    }

    #[test]
    fn test_csv_rendering() {
        let rows = vec![
            json!({"id": 1, "title": "Hamlet, Act 1"}),
            json!({"id": 2, "title": "Say \"hi\"", "city": "Nitra"}),
        ];
        let csv = json_rows_to_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,title,city");
        assert_eq!(lines[1], "1,\"Hamlet, Act 1\",");
        assert_eq!(lines[2], "2,\"Say \"\"hi\"\"\",Nitra");
    }

    #[test]
    fn test_find_diff_keys() {
        let old = json!({"a": 1, "b": 2, "c": 3});
        let new = json!({"a": 1, "b": 5, "d": 4});
        assert_eq!(find_diff_keys(&old, &new), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_distance_is_zero_at_origin() {
        assert!(approximate_distance_miles(48.14, 17.10, 48.14, 17.10) < f64::EPSILON);
        let d = approximate_distance_miles(48.14, 17.10, 48.30, 18.08);
        assert!(d > 40.0 && d < 60.0);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 8), "hello...");
    }

    proptest! {
        #[test]
        fn prop_total_pages_covers_all_items(total in 0i64..10_000, size in 1i64..500) {
            let pages = total_pages(total, size);
            prop_assert!(pages * size >= total);
            prop_assert!(pages == 0 || (pages - 1) * size < total);
        }

        #[test]
        fn prop_excel_column_is_uppercase(n in 1u32..100_000) {
            let col = number_to_excel_column(n);
            prop_assert!(!col.is_empty());
            prop_assert!(col.chars().all(|c| c.is_ascii_uppercase()));
        }
    }
}
