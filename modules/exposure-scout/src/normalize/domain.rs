use std::collections::BTreeSet;

use serde_json::Value;

use exposure_common::{AttrValue, Finding, NormalizedRecord, RecordType};

use super::fields::{
    array, coerce_int, first_known, hostname, int, joined, lookup, lower_text, text, within,
};
use super::{Anomaly, MapResult};

/// Record types the DNS source asks for, with their wire type codes.
pub(crate) const DNS_TYPES: [(&str, i64); 4] = [("A", 1), ("MX", 15), ("NS", 2), ("TXT", 16)];

/// Column order of a CDX row when the listing has no header row.
const CDX_COLUMNS: [&str; 7] = [
    "urlkey",
    "timestamp",
    "original",
    "mimetype",
    "statuscode",
    "digest",
    "length",
];

fn record(finding: &Finding, record_type: RecordType) -> NormalizedRecord {
    NormalizedRecord::new(&finding.entity_key, record_type, finding.source_id)
}

fn subdomain(finding: &Finding, host: &str) -> NormalizedRecord {
    record(finding, RecordType::Subdomain).with("hostname", AttrValue::text(host))
}

fn a_record(finding: &Finding, ip: &str) -> NormalizedRecord {
    record(finding, RecordType::Dns)
        .with("record", AttrValue::text("A"))
        .with("value", AttrValue::text(ip))
}

/// crt.sh certificate entries. `name_value` holds newline-separated names,
/// often repeated across certificates; each distinct in-scope host is one
/// subdomain.
pub(super) fn crtsh(finding: &Finding) -> MapResult {
    let entries = match &finding.payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        _ => return Err(Anomaly::new("expected a list of crt.sh certificates")),
    };

    let mut hosts = BTreeSet::new();
    for entry in entries {
        let names = [
            lookup(entry, &["name_value"]).and_then(Value::as_str),
            lookup(entry, &["common_name"]).and_then(Value::as_str),
        ];
        for name in names.into_iter().flatten().flat_map(str::lines) {
            if let Some(host) = hostname(name).filter(|h| within(h, &finding.entity_key)) {
                hosts.insert(host);
            }
        }
    }

    Ok(hosts.iter().map(|h| subdomain(finding, h)).collect())
}

/// Hunter.io domain search. Accepts the raw API envelope (`data.emails`) or a
/// bare `emails` list.
pub(super) fn hunter(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if payload.is_null() {
        return Ok(Vec::new());
    }
    if let Some(errors) = lookup(payload, &["errors"]) {
        return Err(Anomaly::new(format!("hunter returned errors: {errors}")));
    }
    let emails = if lookup(payload, &["data", "emails"]).is_some() {
        array(payload, &["data", "emails"])
    } else if lookup(payload, &["emails"]).is_some() {
        array(payload, &["emails"])
    } else {
        return Err(Anomaly::new("expected hunter data.emails"));
    };

    Ok(emails
        .iter()
        .filter(|e| e.is_object())
        .map(|email| {
            let mut r = record(finding, RecordType::EmailAddress)
                .with("address", lower_text(email, &["value"]))
                .with("kind", lower_text(email, &["type"]))
                .with("first_name", text(email, &["first_name"]))
                .with("last_name", text(email, &["last_name"]))
                .with("position", text(email, &["position"]))
                .with("department", text(email, &["department"]))
                .with("linkedin", text(email, &["linkedin"]));
            if let AttrValue::Int(pct) = int(email, &["confidence"]) {
                r = r.with_confidence(pct as f32 / 100.0);
            }
            r
        })
        .collect())
}

/// theHarvester JSON report: `hosts` (`host` or `host:ip`), `emails`, `ips`.
pub(super) fn theharvester(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if !payload.is_object() {
        return Err(Anomaly::new("expected a theHarvester report object"));
    }

    let mut records = Vec::new();
    for host in array(payload, &["hosts"]).iter().filter_map(Value::as_str) {
        let (name, ip) = match host.split_once(':') {
            Some((name, ip)) => (name, Some(ip.trim())),
            None => (host, None),
        };
        if let Some(name) = hostname(name).filter(|h| within(h, &finding.entity_key)) {
            records.push(subdomain(finding, &name));
        }
        for ip in ip
            .into_iter()
            .flat_map(|ips| ips.split(','))
            .filter(|ip| !ip.trim().is_empty())
        {
            records.push(a_record(finding, ip.trim()));
        }
    }
    for email in array(payload, &["emails"]).iter().filter_map(Value::as_str) {
        records.push(
            record(finding, RecordType::EmailAddress)
                .with("address", AttrValue::text(email.to_lowercase())),
        );
    }
    for ip in array(payload, &["ips"]).iter().filter_map(Value::as_str) {
        records.push(a_record(finding, ip));
    }
    Ok(records)
}

/// Wayback CDX rows. The first row names the columns.
pub(super) fn wayback(finding: &Finding) -> MapResult {
    let rows = match &finding.payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        _ => return Err(Anomaly::new("expected CDX rows")),
    };
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let cells = |row: &Value| -> Vec<String> {
        row.as_array()
            .map(|r| r.iter().map(|c| c.as_str().unwrap_or_default().to_string()).collect())
            .unwrap_or_default()
    };
    let first_cells = cells(first);
    let has_header = first_cells.iter().any(|c| c == "timestamp");
    let header: Vec<String> = if has_header {
        first_cells
    } else {
        CDX_COLUMNS.iter().map(|c| c.to_string()).collect()
    };
    let column = |name: &str| header.iter().position(|h| h == name);
    let (ts, original, status, mime, digest) = (
        column("timestamp"),
        column("original"),
        column("statuscode"),
        column("mimetype"),
        column("digest"),
    );

    let data_rows = if has_header { &rows[1..] } else { &rows[..] };
    Ok(data_rows
        .iter()
        .map(|row| {
            let row = cells(row);
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(|v| AttrValue::text(v.as_str()))
                    .unwrap_or(AttrValue::Unknown)
            };
            let status_code = match cell(status) {
                AttrValue::Text(s) => AttrValue::Int(coerce_int(&Value::String(s))),
                other => other,
            };
            record(finding, RecordType::Snapshot)
                .with("timestamp", cell(ts))
                .with("original", cell(original))
                .with("status_code", status_code)
                .with("mime_type", cell(mime))
                .with("digest", cell(digest))
        })
        .collect())
}

/// Shodan host record: `ip_str`, `data` banners, `ports`, `vulns`.
pub(super) fn shodan(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if payload.is_null() {
        return Ok(Vec::new());
    }
    if !payload.is_object() {
        return Err(Anomaly::new("expected a Shodan host object"));
    }
    if let Some(error) = lookup(payload, &["error"]).and_then(Value::as_str) {
        return Err(Anomaly::new(format!("shodan error: {error}")));
    }

    let ip = text(payload, &["ip_str"]);
    let mut records = Vec::new();
    if let Some(addr) = ip.as_str() {
        records.push(a_record(finding, addr));
    }

    let banners = array(payload, &["data"]);
    if banners.is_empty() {
        for port in array(payload, &["ports"]) {
            records.push(
                record(finding, RecordType::ServiceExposure)
                    .with("ip", ip.clone())
                    .with("port", AttrValue::Int(coerce_int(port))),
            );
        }
    } else {
        for banner in banners {
            records.push(
                record(finding, RecordType::ServiceExposure)
                    .with("ip", ip.clone())
                    .with("port", int(banner, &["port"]))
                    .with("transport", text(banner, &["transport"]))
                    .with("product", text(banner, &["product"]))
                    .with("version", text(banner, &["version"])),
            );
        }
    }

    let cves: Vec<String> = match lookup(payload, &["vulns"]) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };
    for cve in cves {
        records.push(
            record(finding, RecordType::Vulnerability)
                .with("cve", AttrValue::text(cve.to_uppercase()))
                .with("ip", ip.clone()),
        );
    }
    Ok(records)
}

/// VirusTotal v3 domain report. Only engines that flagged the domain become
/// verdict records.
pub(super) fn virustotal(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if let Some(code) = lookup(payload, &["error", "code"]) {
        return Err(Anomaly::new(format!("virustotal error: {code}")));
    }
    let Some(results) = lookup(payload, &["data", "attributes", "last_analysis_results"])
        .and_then(Value::as_object)
    else {
        return Err(Anomaly::new("expected data.attributes.last_analysis_results"));
    };

    Ok(results
        .iter()
        .filter_map(|(engine, verdict)| {
            let category = lower_text(verdict, &["category"]);
            match category.as_str() {
                Some("malicious") | Some("suspicious") => Some(
                    record(finding, RecordType::AvVerdict)
                        .with("engine", AttrValue::text(engine.as_str()))
                        .with("category", category.clone())
                        .with("result", text(verdict, &["result"])),
                ),
                _ => None,
            }
        })
        .collect())
}

/// DNS-over-HTTPS answers keyed by record type (`{"A": {...}, "MX": ...}`).
/// Answers of other types (CNAME hops) are skipped; a type that was not
/// resolved simply contributes nothing.
pub(super) fn dns(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if payload.is_null() {
        return Ok(Vec::new());
    }
    if !DNS_TYPES.iter().any(|(name, _)| payload.get(name).is_some()) {
        return Err(Anomaly::new("expected DNS answers keyed by record type"));
    }

    let mut records = Vec::new();
    for (name, code) in DNS_TYPES {
        let Some(response) = lookup(payload, &[name]) else {
            continue;
        };
        for answer in array(response, &["Answer"]) {
            if int(answer, &["type"]).as_i64() != Some(code) {
                continue;
            }
            let Some(data) = answer.get("data").and_then(Value::as_str) else {
                continue;
            };
            let value = dns_value(name, data);
            if value.is_empty() {
                continue;
            }
            records.push(
                record(finding, RecordType::Dns)
                    .with("record", AttrValue::text(name))
                    .with("value", AttrValue::Text(value))
                    .with("ttl", int(answer, &["TTL"])),
            );
        }
    }
    Ok(records)
}

/// Presentation form of an answer: names lose the trailing dot, TXT strings
/// lose their quoting.
fn dns_value(record_type: &str, data: &str) -> String {
    let data = data.trim();
    match record_type {
        "TXT" => data
            .split("\" \"")
            .map(|chunk| chunk.trim_matches('"'))
            .collect::<String>(),
        "NS" => data.trim_end_matches('.').to_lowercase(),
        "MX" => match data.split_once(' ') {
            Some((preference, host)) => {
                format!("{preference} {}", host.trim_end_matches('.').to_lowercase())
            }
            None => data.trim_end_matches('.').to_lowercase(),
        },
        _ => data.to_string(),
    }
}

/// RDAP domain object. One registration record: registrar, lifecycle dates
/// (day precision) and name servers.
pub(super) fn whois(finding: &Finding) -> MapResult {
    let payload = &finding.payload;
    if payload.is_null() {
        return Ok(Vec::new());
    }
    let is_domain = text(payload, &["objectClassName"]).as_str() == Some("domain")
        || payload.get("ldhName").is_some();
    if !is_domain {
        return Err(Anomaly::new("expected an RDAP domain object"));
    }

    let event = |action: &str| {
        array(payload, &["events"])
            .iter()
            .find(|e| text(e, &["eventAction"]).as_str() == Some(action))
            .and_then(|e| e.get("eventDate").and_then(Value::as_str))
            .map(|date| AttrValue::text(date.get(..10).unwrap_or(date)))
            .unwrap_or(AttrValue::Unknown)
    };

    let nameservers: BTreeSet<String> = array(payload, &["nameservers"])
        .iter()
        .filter_map(|ns| ns.get("ldhName").and_then(Value::as_str))
        .filter_map(hostname)
        .collect();
    let nameservers = if nameservers.is_empty() {
        AttrValue::Unknown
    } else {
        AttrValue::text(nameservers.into_iter().collect::<Vec<_>>().join(", "))
    };

    Ok(vec![record(finding, RecordType::Registration)
        .with(
            "domain",
            first_known(
                lower_text(payload, &["ldhName"]),
                AttrValue::text(finding.entity_key.as_str()),
            ),
        )
        .with("registrar", registrar(payload))
        .with("created", event("registration"))
        .with("updated", event("last changed"))
        .with("expires", event("expiration"))
        .with("status", joined(payload, &["status"], ", "))
        .with("name_servers", nameservers)])
}

/// Registrar name from the entity holding the `registrar` role: the vCard
/// `fn`, else its IANA id, else its handle.
fn registrar(payload: &Value) -> AttrValue {
    let Some(entity) = array(payload, &["entities"]).iter().find(|e| {
        array(e, &["roles"])
            .iter()
            .any(|r| r.as_str() == Some("registrar"))
    }) else {
        return AttrValue::Unknown;
    };

    let vcard_name = lookup(entity, &["vcardArray"])
        .and_then(|v| v.get(1))
        .and_then(Value::as_array)
        .and_then(|props| {
            props
                .iter()
                .find(|p| p.get(0).and_then(Value::as_str) == Some("fn"))
        })
        .and_then(|p| p.get(3))
        .and_then(Value::as_str)
        .map(AttrValue::text)
        .unwrap_or(AttrValue::Unknown);

    let public_id = array(entity, &["publicIds"])
        .first()
        .map(|id| text(id, &["identifier"]))
        .unwrap_or(AttrValue::Unknown);

    first_known(vcard_name, first_known(public_id, text(entity, &["handle"])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_common::{EntityType, SourceId};
    use serde_json::json;

    fn finding(source: SourceId, payload: Value) -> Finding {
        Finding::success(source, EntityType::Domain, "example.com", payload)
    }

    #[test]
    fn crtsh_dedups_names_and_drops_out_of_scope_hosts() {
        let f = finding(
            SourceId::CrtSh,
            json!([
                {"name_value": "www.example.com\n*.dev.example.com", "common_name": "example.com"},
                {"name_value": "WWW.example.com\nexample.org"}
            ]),
        );
        let records = crtsh(&f).unwrap();
        let hosts: Vec<_> = records.iter().filter_map(|r| r.text("hostname")).collect();
        assert_eq!(hosts, vec!["dev.example.com", "example.com", "www.example.com"]);
    }

    #[test]
    fn hunter_emails_carry_kind_and_confidence() {
        let f = finding(
            SourceId::Hunter,
            json!({"data": {"emails": [
                {"value": "Jane@Example.com", "type": "personal", "confidence": 92, "first_name": "Jane"},
                {"value": "info@example.com", "type": "generic"}
            ]}}),
        );
        let records = hunter(&f).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("address"), Some("jane@example.com"));
        assert_eq!(records[0].text("kind"), Some("personal"));
        assert!((records[0].confidence - 0.92).abs() < 1e-6);
        assert_eq!(records[1].confidence, SourceId::Hunter.base_confidence());
    }

    #[test]
    fn harvester_hosts_split_into_subdomains_and_dns() {
        let f = finding(
            SourceId::TheHarvester,
            json!({
                "hosts": ["mail.example.com:10.0.0.1", "vpn.example.com", "other.net"],
                "emails": ["Admin@example.com"],
                "ips": ["10.0.0.2"]
            }),
        );
        let records = theharvester(&f).unwrap();
        let count = |t| records.iter().filter(|r| r.record_type == t).count();
        assert_eq!(count(RecordType::Subdomain), 2);
        assert_eq!(count(RecordType::Dns), 2);
        assert_eq!(count(RecordType::EmailAddress), 1);
    }

    #[test]
    fn wayback_uses_header_row() {
        let f = finding(
            SourceId::Wayback,
            json!([
                ["urlkey", "timestamp", "original", "mimetype", "statuscode", "digest", "length"],
                ["com,example)/", "20200101000000", "http://example.com/", "text/html", "200", "ABC", "1234"],
                ["com,example)/", "20210101000000", "http://example.com/", "text/html", "-", "DEF", "99"]
            ]),
        );
        let records = wayback(&f).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("timestamp"), Some("20200101000000"));
        assert_eq!(records[0].int("status_code"), Some(200));
        assert_eq!(records[1].int("status_code"), Some(0));
    }

    #[test]
    fn shodan_host_yields_services_and_vulns() {
        let f = finding(
            SourceId::Shodan,
            json!({
                "ip_str": "93.184.216.34",
                "ports": [80, 3389],
                "data": [
                    {"port": 80, "transport": "tcp", "product": "nginx"},
                    {"port": 3389, "transport": "tcp"}
                ],
                "vulns": {"cve-2021-44228": {}}
            }),
        );
        let records = shodan(&f).unwrap();
        let services: Vec<_> = records
            .iter()
            .filter(|r| r.record_type == RecordType::ServiceExposure)
            .collect();
        assert_eq!(services.len(), 2);
        assert_eq!(services[1].int("port"), Some(3389));
        let vuln = records
            .iter()
            .find(|r| r.record_type == RecordType::Vulnerability)
            .unwrap();
        assert_eq!(vuln.text("cve"), Some("CVE-2021-44228"));
    }

    #[test]
    fn virustotal_keeps_only_flagging_engines() {
        let f = finding(
            SourceId::VirusTotal,
            json!({"data": {"attributes": {"last_analysis_results": {
                "EngineA": {"category": "malicious", "result": "phishing"},
                "EngineB": {"category": "harmless", "result": "clean"},
                "EngineC": {"category": "suspicious", "result": "suspicious"}
            }}}}),
        );
        let records = virustotal(&f).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.text("engine").is_some()));
    }

    #[test]
    fn virustotal_without_analysis_is_an_anomaly() {
        let f = finding(SourceId::VirusTotal, json!({"data": {}}));
        assert!(virustotal(&f).is_err());
    }

    #[test]
    fn dns_answers_become_typed_records() {
        let f = finding(
            SourceId::Dns,
            json!({
                "A": {"Status": 0, "Answer": [
                    {"name": "example.com.", "type": 5, "TTL": 60, "data": "edge.example.net."},
                    {"name": "example.com.", "type": 1, "TTL": 300, "data": "93.184.216.34"}
                ]},
                "MX": {"Status": 0, "Answer": [
                    {"name": "example.com.", "type": 15, "TTL": 300, "data": "10 Mail.Example.com."}
                ]},
                "NS": {"Status": 0, "Answer": [
                    {"name": "example.com.", "type": 2, "TTL": 300, "data": "a.iana-servers.net."}
                ]},
                "TXT": {"Status": 0, "Answer": [
                    {"name": "example.com.", "type": 16, "TTL": 300, "data": "\"v=spf1 -all\""}
                ]}
            }),
        );
        let records = dns(&f).unwrap();
        let values: Vec<_> = records
            .iter()
            .map(|r| (r.text("record").unwrap(), r.text("value").unwrap()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("A", "93.184.216.34"),
                ("MX", "10 mail.example.com"),
                ("NS", "a.iana-servers.net"),
                ("TXT", "v=spf1 -all"),
            ]
        );
        assert_eq!(records[0].int("ttl"), Some(300));
    }

    #[test]
    fn dns_type_without_answers_contributes_nothing() {
        let f = finding(SourceId::Dns, json!({"A": {"Status": 3}, "MX": {"Status": 0}}));
        assert!(dns(&f).unwrap().is_empty());
        assert!(dns(&finding(SourceId::Dns, json!({"foo": 1}))).is_err());
    }

    #[test]
    fn dns_a_records_merge_with_shodan_addresses() {
        let resolver = finding(
            SourceId::Dns,
            json!({"A": {"Answer": [{"type": 1, "data": "93.184.216.34"}]}}),
        );
        let shodan_host = finding(SourceId::Shodan, json!({"ip_str": "93.184.216.34"}));
        let a = &dns(&resolver).unwrap()[0];
        let b = shodan(&shodan_host)
            .unwrap()
            .into_iter()
            .find(|r| r.record_type == RecordType::Dns)
            .unwrap();
        assert_eq!(a.equality_key(), b.equality_key());
    }

    #[test]
    fn rdap_domain_becomes_one_registration_record() {
        let f = finding(
            SourceId::Whois,
            json!({
                "objectClassName": "domain",
                "ldhName": "EXAMPLE.COM",
                "status": ["client delete prohibited", "client transfer prohibited"],
                "events": [
                    {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
                    {"eventAction": "expiration", "eventDate": "2025-08-13T04:00:00Z"}
                ],
                "entities": [
                    {"roles": ["registrant"], "handle": "X"},
                    {"roles": ["registrar"], "handle": "376",
                     "publicIds": [{"type": "IANA Registrar ID", "identifier": "376"}],
                     "vcardArray": ["vcard", [["version", {}, "text", "4.0"], ["fn", {}, "text", "RESERVED-Internet Assigned Numbers Authority"]]]}
                ],
                "nameservers": [{"ldhName": "B.IANA-SERVERS.NET"}, {"ldhName": "A.IANA-SERVERS.NET"}]
            }),
        );
        let records = whois(&f).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.text("domain"), Some("example.com"));
        assert_eq!(r.text("registrar"), Some("RESERVED-Internet Assigned Numbers Authority"));
        assert_eq!(r.text("created"), Some("1995-08-14"));
        assert_eq!(r.text("expires"), Some("2025-08-13"));
        assert_eq!(r.attr("updated"), &AttrValue::Unknown);
        assert_eq!(r.text("name_servers"), Some("a.iana-servers.net, b.iana-servers.net"));
    }

    #[test]
    fn rdap_registrar_falls_back_to_public_id() {
        let f = finding(
            SourceId::Whois,
            json!({"ldhName": "example.com", "entities": [
                {"roles": ["registrar"], "publicIds": [{"identifier": "292"}]}
            ]}),
        );
        assert_eq!(whois(&f).unwrap()[0].text("registrar"), Some("292"));
        assert!(whois(&finding(SourceId::Whois, Value::Null)).unwrap().is_empty());
        assert!(whois(&finding(SourceId::Whois, json!({"errorCode": 400}))).is_err());
    }
}
