// src/feed/normalize.rs
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{WatchError, WatchResult};
use crate::feed::types::{Item, ItemId, RecencyRule};

const CONTENT_CAP_CHARS: usize = 5_000;

/// Turn a raw provider snapshot into items sorted newest-first.
///
/// Field aliases: `id`; `created_at` then `timestamp`; `content` then `text`.
/// Array elements that are not objects are skipped.
pub fn normalize_snapshot(raw: &Value) -> WatchResult<Vec<Item>> {
    let Some(entries) = raw.as_array() else {
        return Err(WatchError::MalformedSnapshot(format!(
            "expected a JSON array, got {}",
            json_kind(raw)
        )));
    };

    let mut items = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            tracing::warn!(target: "feed", index = idx, kind = json_kind(entry), "skipping non-object entry");
            continue;
        };
        items.push(Item {
            id: parse_id(obj.get("id")).map_or(ItemId::Unknown(idx), ItemId::Known),
            timestamp: first_str(obj, &["created_at", "timestamp"]).and_then(parse_timestamp),
            content: first_str(obj, &["content", "text"])
                .map(clean_content)
                .unwrap_or_default(),
        });
    }

    sort_newest_first(&mut items);
    Ok(items)
}

/// Stable newest-first sort under the snapshot's [`RecencyRule`].
pub fn sort_newest_first(items: &mut [Item]) {
    let rule = RecencyRule::for_items(items);
    items.sort_by(|a, b| b.recency().cmp_by(rule, &a.recency()));
}

fn parse_id(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First alias holding a non-empty string.
fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Status bodies arrive as HTML: drop tags (paragraph breaks become newlines),
/// decode entities, fold whitespace, cap length.
pub fn clean_content(s: &str) -> String {
    static RE_BREAKS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_HSPACE: OnceCell<Regex> = OnceCell::new();
    static RE_NEWLINES: OnceCell<Regex> = OnceCell::new();

    let re_breaks = RE_BREAKS.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>").unwrap());
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    let re_hspace = RE_HSPACE.get_or_init(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
    let re_newlines = RE_NEWLINES.get_or_init(|| Regex::new(r" ?\n[\s]*").unwrap());

    let out = re_breaks.replace_all(s, "\n");
    let out = re_tags.replace_all(&out, "");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let out = re_hspace.replace_all(&out, " ");
    let out = re_newlines.replace_all(&out, "\n");
    let out = out.trim();

    if out.chars().count() > CONTENT_CAP_CHARS {
        out.chars().take(CONTENT_CAP_CHARS).collect()
    } else {
        out.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(items: &[Item]) -> Vec<String> {
        items.iter().map(|i| i.id.to_string()).collect()
    }

    #[test]
    fn non_array_is_malformed() {
        let err = normalize_snapshot(&json!({"error": "rate limited"})).unwrap_err();
        assert!(matches!(err, WatchError::MalformedSnapshot(_)));
    }

    #[test]
    fn numeric_ids_sort_numerically_not_lexically() {
        let raw = json!([
            {"id": "99", "content": "a"},
            {"id": "101", "content": "b"},
            {"id": 100, "content": "c"}
        ]);
        let items = normalize_snapshot(&raw).unwrap();
        assert_eq!(ids(&items), vec!["101", "100", "99"]);
    }

    #[test]
    fn alias_fields_are_used() {
        let raw = json!([
            {"id": "1", "timestamp": "2025-05-31T13:02:00Z", "text": "hello"},
            {"id": "2", "created_at": "2025-05-31T14:00:00Z", "content": "", "text": "fallback"}
        ]);
        let items = normalize_snapshot(&raw).unwrap();
        assert_eq!(items[0].content, "fallback");
        assert_eq!(items[1].content, "hello");
        assert!(items[1].timestamp.is_some());
    }

    #[test]
    fn missing_ids_become_distinct_unknowns() {
        let raw = json!([
            {"created_at": "2025-05-31T13:00:00Z", "content": "x"},
            {"id": null, "created_at": "2025-05-31T12:00:00Z", "content": "y"}
        ]);
        let items = normalize_snapshot(&raw).unwrap();
        assert_eq!(items[0].id, ItemId::Unknown(0));
        assert_eq!(items[1].id, ItemId::Unknown(1));
    }

    #[test]
    fn mixed_ids_fall_back_to_timestamps() {
        let raw = json!([
            {"id": "abc", "created_at": "2025-05-31T10:00:00Z"},
            {"id": "5", "created_at": "2025-05-31T12:00:00Z"},
            {"id": "7", "created_at": "2025-05-31T11:00:00Z"}
        ]);
        let items = normalize_snapshot(&raw).unwrap();
        assert_eq!(ids(&items), vec!["5", "7", "abc"]);
    }

    #[test]
    fn clean_content_strips_markup() {
        let s = "<p>Steel&nbsp;tariffs&nbsp;<b>up</b> &ldquo;big&rdquo;!</p><p>MAGA</p>";
        assert_eq!(clean_content(s), "Steel tariffs up \"big\"!\nMAGA");
    }
}
