//! Weighted rule tables, one per `(entity type, category)` scored by rules.
//!
//! A rule reads one merged record and only fires on known attribute values;
//! an absent attribute never adds weight.

use exposure_common::{NormalizedRecord, RecordType};

/// Service ports whose exposure is a security finding on its own.
pub const RISKY_PORTS: [i64; 10] = [21, 23, 445, 3306, 3389, 5432, 5900, 6379, 9200, 27017];

/// Subdomain labels that usually point at non-production or admin surfaces.
pub const SENSITIVE_LABELS: [&str; 8] = [
    "dev", "staging", "test", "admin", "internal", "vpn", "jenkins", "git",
];

/// Reputation threshold for low-engagement accounts.
pub const LOW_KARMA_BELOW: i64 = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub record_type: RecordType,
    pub weight: f64,
    pub applies: fn(&NormalizedRecord) -> bool,
}

impl Rule {
    pub fn matches(&self, record: &NormalizedRecord) -> bool {
        record.record_type == self.record_type && (self.applies)(record)
    }
}

// --- username ---

fn is_employee(r: &NormalizedRecord) -> bool {
    r.flag("is_employee")
}

fn is_mod(r: &NormalizedRecord) -> bool {
    r.flag("is_mod")
}

fn is_nsfw(r: &NormalizedRecord) -> bool {
    r.flag("is_nsfw")
}

fn is_private(r: &NormalizedRecord) -> bool {
    r.flag("is_private")
}

fn any(_: &NormalizedRecord) -> bool {
    true
}

fn low_karma(r: &NormalizedRecord) -> bool {
    r.int("total_karma").is_some_and(|k| k < LOW_KARMA_BELOW)
}

fn http_error(r: &NormalizedRecord) -> bool {
    r.int("http_status").is_some_and(|s| s >= 400)
}

pub static USERNAME_PRIVACY: &[Rule] = &[
    Rule { name: "profile_employee", record_type: RecordType::ProfileMatch, weight: 3.0, applies: is_employee },
    Rule { name: "profile_moderator", record_type: RecordType::ProfileMatch, weight: 2.0, applies: is_mod },
    Rule { name: "profile_nsfw", record_type: RecordType::ProfileMatch, weight: 1.0, applies: is_nsfw },
    Rule { name: "profile_found", record_type: RecordType::ProfileMatch, weight: 0.25, applies: any },
];

pub static USERNAME_REPUTATION: &[Rule] = &[
    Rule { name: "low_karma", record_type: RecordType::ProfileMatch, weight: 2.0, applies: low_karma },
];

pub static USERNAME_SECURITY: &[Rule] = &[
    Rule { name: "profile_http_error", record_type: RecordType::ProfileMatch, weight: 3.0, applies: http_error },
];

pub static USERNAME_CONFIGURATION: &[Rule] = &[
    Rule { name: "profile_private", record_type: RecordType::ProfileMatch, weight: 2.0, applies: is_private },
];

pub static USERNAME_LEGAL: &[Rule] = &[
    Rule { name: "profile_nsfw", record_type: RecordType::ProfileMatch, weight: 3.0, applies: is_nsfw },
];

// --- email ---

fn password_exposed(r: &NormalizedRecord) -> bool {
    r.flag("password_exposed")
}

fn password_sample(r: &NormalizedRecord) -> bool {
    r.text("password_sample").is_some()
}

fn sensitive_breach(r: &NormalizedRecord) -> bool {
    r.flag("is_sensitive")
}

pub static EMAIL_SECURITY: &[Rule] = &[
    Rule { name: "password_exposed", record_type: RecordType::Breach, weight: 3.0, applies: password_exposed },
    Rule { name: "password_sample_leaked", record_type: RecordType::Breach, weight: 2.0, applies: password_sample },
    Rule { name: "breach_found", record_type: RecordType::Breach, weight: 0.5, applies: any },
];

pub static EMAIL_REPUTATION: &[Rule] = &[
    Rule { name: "sensitive_breach", record_type: RecordType::Breach, weight: 2.0, applies: sensitive_breach },
];

// --- domain ---

fn av_category(r: &NormalizedRecord, category: &str) -> bool {
    r.text("category").is_some_and(|c| c.eq_ignore_ascii_case(category))
}

fn av_malicious(r: &NormalizedRecord) -> bool {
    av_category(r, "malicious")
}

fn av_suspicious(r: &NormalizedRecord) -> bool {
    av_category(r, "suspicious")
}

fn risky_port(r: &NormalizedRecord) -> bool {
    r.int("port").is_some_and(|p| RISKY_PORTS.contains(&p))
}

fn email_kind(r: &NormalizedRecord, kind: &str) -> bool {
    r.text("kind").is_some_and(|k| k.eq_ignore_ascii_case(kind))
}

fn personal_email(r: &NormalizedRecord) -> bool {
    email_kind(r, "personal")
}

fn generic_email(r: &NormalizedRecord) -> bool {
    email_kind(r, "generic")
}

fn sensitive_subdomain(r: &NormalizedRecord) -> bool {
    r.text("hostname").is_some_and(|host| {
        host.split('.')
            .any(|label| SENSITIVE_LABELS.iter().any(|s| label.eq_ignore_ascii_case(s)))
    })
}

pub static DOMAIN_SECURITY: &[Rule] = &[
    Rule { name: "av_malicious", record_type: RecordType::AvVerdict, weight: 3.0, applies: av_malicious },
    Rule { name: "av_suspicious", record_type: RecordType::AvVerdict, weight: 1.0, applies: av_suspicious },
    Rule { name: "risky_port_open", record_type: RecordType::ServiceExposure, weight: 2.0, applies: risky_port },
    Rule { name: "service_exposed", record_type: RecordType::ServiceExposure, weight: 0.5, applies: any },
    Rule { name: "known_vulnerability", record_type: RecordType::Vulnerability, weight: 3.0, applies: any },
];

pub static DOMAIN_PRIVACY: &[Rule] = &[
    Rule { name: "personal_email_exposed", record_type: RecordType::EmailAddress, weight: 1.0, applies: personal_email },
    Rule { name: "generic_email_exposed", record_type: RecordType::EmailAddress, weight: 0.25, applies: generic_email },
];

pub static DOMAIN_CONFIGURATION: &[Rule] = &[
    Rule { name: "sensitive_subdomain", record_type: RecordType::Subdomain, weight: 1.0, applies: sensitive_subdomain },
];
