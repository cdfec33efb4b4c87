use serde_json::Value;

use exposure_common::{AttrValue, Finding, NormalizedRecord, RecordType};

use super::fields::{array, first_known, flag, int, joined, text};
use super::{Anomaly, MapResult};

/// Sherlock: `{"profiles": [{"site", "url"}]}` or a bare list of URLs.
pub(super) fn sherlock(finding: &Finding) -> MapResult {
    profile_list(finding)
}

/// Maigret: the `--json simple` report (site name to entry) or, when the
/// report file was missing, the same profile list Sherlock produces.
pub(super) fn maigret(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if payload.is_null() {
        return Ok(Vec::new());
    }
    if payload.get("profiles").is_some() || payload.is_array() {
        return profile_list(finding);
    }
    let Some(sites) = payload.as_object() else {
        return Err(Anomaly::new("expected a maigret site report object"));
    };

    Ok(sites
        .iter()
        .filter(|(_, entry)| entry.is_object())
        .map(|(site, entry)| maigret_entry(finding, site, entry))
        .collect())
}

fn maigret_entry(finding: &Finding, site: &str, entry: &Value) -> NormalizedRecord {
    let url = first_known(text(entry, &["url_user"]), text(entry, &["status", "url"]));
    NormalizedRecord::new(&finding.entity_key, RecordType::ProfileMatch, finding.source_id)
        .with("url", url)
        .with("site", AttrValue::text(site))
        .with("http_status", int(entry, &["http_status"]))
        .with("is_employee", flag(entry, &id("is_employee")))
        .with("is_mod", flag(entry, &id("is_mod")))
        .with(
            "is_nsfw",
            first_known(flag(entry, &id("is_nsfw")), flag(entry, &["status", "is_nsfw"])),
        )
        .with("is_private", flag(entry, &id("is_private")))
        .with(
            "total_karma",
            first_known(int(entry, &id("total_karma")), int(entry, &["status", "total_karma"])),
        )
        .with("tags", joined(entry, &["status", "tags"], ", "))
}

fn id(name: &'static str) -> [&'static str; 3] {
    ["status", "ids", name]
}

fn profile_list(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    let items = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) if payload.get("profiles").is_some_and(Value::is_array) => {
            array(payload, &["profiles"])
        }
        Value::Null => return Ok(Vec::new()),
        _ => return Err(Anomaly::new("expected a profile list")),
    };

    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(url) if looks_like_url(url) => Some(
                NormalizedRecord::new(&finding.entity_key, RecordType::ProfileMatch, finding.source_id)
                    .with("url", AttrValue::text(url.as_str())),
            ),
            Value::Object(_) => Some(
                NormalizedRecord::new(&finding.entity_key, RecordType::ProfileMatch, finding.source_id)
                    .with("url", first_known(text(item, &["url"]), text(item, &["url_user"])))
                    .with("site", first_known(text(item, &["site"]), text(item, &["name"]))),
            ),
            _ => None,
        })
        .collect())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_common::{EntityType, SourceId};
    use serde_json::json;

    fn finding(source: SourceId, payload: Value) -> Finding {
        Finding::success(source, EntityType::Username, "alice", payload)
    }

    #[test]
    fn sherlock_profiles_become_profile_matches() {
        let f = finding(
            SourceId::Sherlock,
            json!({"profiles": [
                {"site": "GitHub", "url": "https://github.com/alice"},
                {"site": "Broken"}
            ]}),
        );
        let records = sherlock(&f).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("url"), Some("https://github.com/alice"));
        assert_eq!(records[1].equality_key(), None);
    }

    #[test]
    fn bare_url_lists_skip_non_urls() {
        let f = finding(
            SourceId::Sherlock,
            json!(["https://example.com/u/alice", "Error running tool"]),
        );
        assert_eq!(sherlock(&f).unwrap().len(), 1);
    }

    #[test]
    fn maigret_report_reads_reddit_ids_with_string_booleans() {
        let f = finding(
            SourceId::Maigret,
            json!({
                "Reddit": {
                    "url_user": "https://www.reddit.com/user/alice",
                    "http_status": 200,
                    "status": {
                        "ids": {"is_employee": "True", "is_mod": "false", "total_karma": "250"},
                        "is_nsfw": "True",
                        "tags": ["news", "discussion"]
                    }
                }
            }),
        );
        let records = maigret(&f).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!(r.flag("is_employee"));
        assert!(!r.flag("is_mod"));
        assert!(r.flag("is_nsfw"));
        assert_eq!(r.int("total_karma"), Some(250));
        assert_eq!(r.int("http_status"), Some(200));
        assert_eq!(r.attr("is_private"), &AttrValue::Unknown);
        assert_eq!(r.text("site"), Some("Reddit"));
    }

    #[test]
    fn maigret_falls_back_to_profile_list() {
        let f = finding(
            SourceId::Maigret,
            json!({"profiles": [{"site": "GitHub", "url": "https://github.com/alice"}]}),
        );
        assert_eq!(maigret(&f).unwrap().len(), 1);
    }

    #[test]
    fn scalar_payload_is_an_anomaly() {
        assert!(sherlock(&finding(SourceId::Sherlock, json!(42))).is_err());
        assert!(maigret(&finding(SourceId::Maigret, json!("nope"))).is_err());
    }
}
