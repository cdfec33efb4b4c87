use serde_json::Value;

use exposure_common::{AttrValue, Finding, NormalizedRecord, RecordType};

use super::fields::{array, first_known, flag, hostname, int, joined, lookup, lower_text, lowercase, text};
use super::{Anomaly, MapResult};

/// HIBP breached-account list. `truncateResponse=false` gives full breach
/// models: `Name`, `Title`, `Domain`, `BreachDate`, `PwnCount`,
/// `DataClasses`, `IsSensitive`, `IsVerified`.
pub(super) fn hibp(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    let breaches = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items.as_slice(),
        Value::Object(_) if payload.get("breaches").is_some_and(Value::is_array) => {
            array(payload, &["breaches"])
        }
        _ => return Err(Anomaly::new("expected a list of HIBP breaches")),
    };

    Ok(breaches
        .iter()
        .filter(|b| b.is_object())
        .map(|breach| {
            let name = first_known(text(breach, &["Name"]), text(breach, &["Title"]));
            let password_exposed = match lookup(breach, &["DataClasses"]).and_then(Value::as_array) {
                Some(classes) => AttrValue::Bool(
                    classes
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|c| c.eq_ignore_ascii_case("passwords")),
                ),
                None => AttrValue::Unknown,
            };

            NormalizedRecord::new(&finding.entity_key, RecordType::Breach, finding.source_id)
                .with("fingerprint", lowercase(name.clone()))
                .with("breach_source", name)
                .with("title", text(breach, &["Title"]))
                .with("domain", lower_text(breach, &["Domain"]))
                .with("breach_date", text(breach, &["BreachDate"]))
                .with("pwn_count", int(breach, &["PwnCount"]))
                .with("data_classes", joined(breach, &["DataClasses"], ", "))
                .with("password_exposed", password_exposed)
                .with("is_sensitive", flag(breach, &["IsSensitive"]))
                .with("is_verified", flag(breach, &["IsVerified"]))
        })
        .collect())
}

/// BreachDirectory `func=auto` response: `{success, found, result: [...]}`.
/// Each leak carries its `sources`, a partial `password`, and hashes.
pub(super) fn breachdirectory(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if payload.is_null() {
        return Ok(Vec::new());
    }
    if !payload.is_object() {
        return Err(Anomaly::new("expected a BreachDirectory response object"));
    }
    if flag(payload, &["success"]) != AttrValue::Bool(true) {
        let reason = text(payload, &["message"]);
        return Err(Anomaly::new(format!("BreachDirectory reported failure: {reason}")));
    }

    Ok(array(payload, &["result"])
        .iter()
        .filter(|leak| leak.is_object())
        .map(|leak| {
            let sources = joined(leak, &["sources"], ", ");
            let domain = sources
                .as_str()
                .and_then(hostname)
                .map(AttrValue::Text)
                .unwrap_or(AttrValue::Unknown);
            let fingerprint = first_known(text(leak, &["sha1"]), text(leak, &["hash"]));
            let password_exposed =
                first_known(flag(leak, &["hash_password"]), flag(leak, &["has_password"]));

            NormalizedRecord::new(&finding.entity_key, RecordType::Breach, finding.source_id)
                .with("breach_source", sources)
                .with("fingerprint", fingerprint)
                .with("domain", domain)
                .with("password_exposed", password_exposed)
                .with("password_sample", text(leak, &["password"]))
        })
        .collect())
}

/// Holehe: `{"services": ["twitter.com", ...]}` or a bare list of domains.
pub(super) fn holehe(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    let services = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items.as_slice(),
        Value::Object(_) if payload.get("services").is_some_and(Value::is_array) => {
            array(payload, &["services"])
        }
        _ => return Err(Anomaly::new("expected a list of holehe services")),
    };

    Ok(services
        .iter()
        .filter_map(Value::as_str)
        .map(|service| {
            let domain = hostname(service)
                .map(AttrValue::Text)
                .unwrap_or_else(|| AttrValue::text(service.to_lowercase()));
            NormalizedRecord::new(&finding.entity_key, RecordType::ServiceAccount, finding.source_id)
                .with("domain", domain)
        })
        .collect())
}
