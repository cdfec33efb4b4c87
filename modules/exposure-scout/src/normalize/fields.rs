//! Defensive access into provider JSON. Nothing here fails: absent or null
//! fields read as `Unknown`, unparsable numbers read as `0`.

use serde_json::Value;

use exposure_common::AttrValue;

/// Walk `path` through nested objects. `null` counts as absent.
pub(crate) fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    (!current.is_null()).then_some(current)
}

/// Array at `path`, or an empty slice.
pub(crate) fn array<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    lookup(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub(crate) fn text(value: &Value, path: &[&str]) -> AttrValue {
    match lookup(value, path) {
        Some(Value::String(s)) => AttrValue::text(s.as_str()),
        Some(Value::Number(n)) => AttrValue::text(n.to_string()),
        Some(Value::Bool(b)) => AttrValue::text(b.to_string()),
        _ => AttrValue::Unknown,
    }
}

pub(crate) fn lower_text(value: &Value, path: &[&str]) -> AttrValue {
    lowercase(text(value, path))
}

pub(crate) fn lowercase(attr: AttrValue) -> AttrValue {
    match attr {
        AttrValue::Text(s) => AttrValue::Text(s.to_lowercase()),
        other => other,
    }
}

/// Integer at `path`. Present but unparsable values coerce to `0`.
pub(crate) fn int(value: &Value, path: &[&str]) -> AttrValue {
    match lookup(value, path) {
        None => AttrValue::Unknown,
        Some(v) => AttrValue::Int(coerce_int(v)),
    }
}

pub(crate) fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Boolean at `path`. Providers send real booleans, `"True"`/`"false"`
/// strings, or 0/1.
pub(crate) fn flag(value: &Value, path: &[&str]) -> AttrValue {
    match lookup(value, path) {
        None => AttrValue::Unknown,
        Some(Value::Bool(b)) => AttrValue::Bool(*b),
        Some(Value::Number(n)) => AttrValue::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => AttrValue::Bool(true),
            "false" | "no" | "0" => AttrValue::Bool(false),
            _ => AttrValue::Unknown,
        },
        Some(_) => AttrValue::Unknown,
    }
}

/// The first argument unless it is `Unknown`.
pub(crate) fn first_known(primary: AttrValue, fallback: AttrValue) -> AttrValue {
    if primary.is_known() {
        primary
    } else {
        fallback
    }
}

/// Strings at `path` (an array of strings or a single string), joined.
pub(crate) fn joined(value: &Value, path: &[&str], sep: &str) -> AttrValue {
    match lookup(value, path) {
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            AttrValue::text(parts.join(sep))
        }
        Some(_) => text(value, path),
        None => AttrValue::Unknown,
    }
}

/// Hostname form of a free-text name: trimmed, lower-cased, wildcard and
/// trailing dot removed.
pub(crate) fn hostname(raw: &str) -> Option<String> {
    let host = raw
        .trim()
        .trim_start_matches("*.")
        .trim_end_matches('.')
        .to_lowercase();
    let valid = !host.is_empty()
        && host.contains('.')
        && !host.contains(char::is_whitespace)
        && !host.contains('@')
        && !host.contains('/');
    valid.then_some(host)
}

/// True when `host` is `domain` or one of its subdomains.
pub(crate) fn within(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}
