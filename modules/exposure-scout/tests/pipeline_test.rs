//! End-to-end runs through `Pipeline` with mock adapters, plus the merge and
//! scoring properties the report depends on.
//!
//! No network, no external tools.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use exposure_common::{
    EntityType, Finding, RecordType, RiskCategory, RiskTier, SectionBody,
    SourceErrorKind, SourceId,
};
use exposure_scout::coordinator::AggregateResult;
use exposure_scout::merger::merge;
use exposure_scout::normalize::normalize;
use exposure_scout::report::assemble_at;
use exposure_scout::scoring::{score, RankList};
use exposure_scout::testing::{canonical, profile, subdomain, MockAdapter};
use exposure_scout::{Pipeline, QueryCoordinator, RankLookup, SourceAdapter};

fn coordinator(timeout_ms: u64) -> QueryCoordinator {
    QueryCoordinator::new(Duration::from_millis(timeout_ms), Duration::from_secs(5), 4)
}

fn adapter(mock: MockAdapter) -> Arc<dyn SourceAdapter> {
    Arc::new(mock)
}

/// Every ordering of `items`.
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

fn username_findings() -> Vec<Finding> {
    vec![
        Finding::success(
            SourceId::Sherlock,
            EntityType::Username,
            "alice",
            json!({"profiles": [
                {"site": "GitHub", "url": "https://github.com/alice"},
                {"site": "Reddit", "url": "https://www.reddit.com/user/alice"}
            ]}),
        ),
        Finding::success(
            SourceId::Maigret,
            EntityType::Username,
            "alice",
            json!({
                "GitHub": {"url_user": "https://github.com/alice", "status": {"ids": {"is_employee": "true"}}},
                "Pinterest": {"url_user": "https://pinterest.com/alice"}
            }),
        ),
        Finding::success(
            SourceId::Sherlock,
            EntityType::Username,
            "alice",
            json!(["https://pinterest.com/alice"]),
        ),
    ]
}

// ---------------------------------------------------------------------------
// Merge properties
// ---------------------------------------------------------------------------

#[test]
fn merge_is_order_invariant_over_every_permutation() {
    let findings = username_findings();
    let mut views = permutations(&findings).into_iter().map(|order| {
        let records = order.iter().flat_map(normalize).collect();
        canonical(&merge(EntityType::Username, "alice", records))
    });
    let first = views.next().unwrap();
    assert_eq!(first.len(), 3);
    for view in views {
        assert_eq!(view, first);
    }
}

#[test]
fn dedup_never_increases_the_count() {
    let findings = username_findings();
    for n in 0..=findings.len() {
        let records: Vec<_> = findings[..n].iter().flat_map(normalize).collect();
        let before = records.len();
        let merged = merge(EntityType::Username, "alice", records);
        assert!(merged.records.len() <= before);
    }
}

#[test]
fn duplicate_profile_url_is_one_record_with_both_sources() {
    let url = "https://example.com/u/alice";
    let merged = merge(
        EntityType::Username,
        "alice",
        vec![
            profile("alice", SourceId::Sherlock, url),
            profile("alice", SourceId::Maigret, url),
        ],
    );
    assert_eq!(merged.count_of(RecordType::ProfileMatch), 1);
    let only = &merged.records[0];
    assert!(only.sources.contains(&SourceId::Sherlock));
    assert!(only.sources.contains(&SourceId::Maigret));
    assert!(merged.provenance.contains(&SourceId::Sherlock));
    assert!(merged.provenance.contains(&SourceId::Maigret));
}

// ---------------------------------------------------------------------------
// Rank scoring
// ---------------------------------------------------------------------------

fn domain_reputation(rank: Option<u64>) -> RiskTier {
    let ranks = match rank {
        Some(r) => RankList::from_pairs([("example.com", r)]),
        None => RankList::default(),
    };
    let entity = merge(
        EntityType::Domain,
        "example.com",
        vec![subdomain("example.com", SourceId::CrtSh, "www.example.com")],
    );
    score(&entity, &ranks)
        .into_iter()
        .find(|a| a.category == RiskCategory::Reputation)
        .map(|a| a.tier)
        .unwrap()
}

#[test]
fn rank_scenarios() {
    assert_eq!(domain_reputation(Some(500)), RiskTier::Critical);
    assert_eq!(domain_reputation(Some(5_000)), RiskTier::High);
    assert_eq!(domain_reputation(Some(50_000)), RiskTier::Medium);
    assert_eq!(domain_reputation(Some(500_000)), RiskTier::Low);
    assert_eq!(domain_reputation(None), RiskTier::Low);
}

#[test]
fn better_rank_never_lowers_the_tier() {
    let ranks = [1, 999, 1_000, 9_999, 10_000, 99_999, 100_000, 2_000_000];
    for pair in ranks.windows(2) {
        assert!(domain_reputation(Some(pair[0])) >= domain_reputation(Some(pair[1])));
    }
    assert!(domain_reputation(Some(2_000_000)) >= domain_reputation(None));
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[test]
fn report_assembly_is_idempotent() {
    let records = username_findings().iter().flat_map(normalize).collect();
    let merged = merge(EntityType::Username, "alice", records);
    let assessments = score(&merged, &RankList::default());
    let sources = AggregateResult {
        attempted: vec![SourceId::Sherlock, SourceId::Maigret],
        ..Default::default()
    };
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let first = assemble_at(EntityType::Username, "alice", &merged, &assessments, &[], &sources, at);
    let second = assemble_at(EntityType::Username, "alice", &merged, &assessments, &[], &sources, at);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// ---------------------------------------------------------------------------
// Pipeline runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_failure_returns_within_the_deadline() {
    let pipeline = Pipeline::builder()
        .adapters(vec![
            adapter(MockAdapter::new(SourceId::Sherlock).returns(json!(["https://github.com/alice"]))),
            adapter(MockAdapter::new(SourceId::Maigret).returns(json!({
                "Reddit": {"url_user": "https://www.reddit.com/user/alice"}
            }))),
            adapter(
                MockAdapter::new(SourceId::Sherlock)
                    .returns(json!(["https://slow.example/alice"]))
                    .delayed(Duration::from_secs(10)),
            ),
        ])
        .coordinator(coordinator(200))
        .recommendation_seed(Some(42))
        .build();

    let started = Instant::now();
    let (report, stats) = pipeline
        .analyze_with_stats(EntityType::Username, "alice")
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.sources_succeeded, 2);
    assert_eq!(stats.sources_failed, 1);
    assert_eq!(report.metric("profiles_found"), 2);
    match &report.section("Source errors").unwrap().body {
        SectionBody::SourceErrors(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].kind, SourceErrorKind::Timeout);
        }
        other => panic!("unexpected body {other:?}"),
    }
}

#[tokio::test]
async fn zero_successful_sources_still_yields_a_complete_report() {
    let pipeline = Pipeline::builder()
        .adapters(vec![
            adapter(MockAdapter::new(SourceId::Hibp).fails(SourceErrorKind::AuthMissing)),
            adapter(MockAdapter::new(SourceId::BreachDirectory).fails(SourceErrorKind::RateLimited)),
            adapter(MockAdapter::new(SourceId::Holehe).fails(SourceErrorKind::Unavailable)),
        ])
        .coordinator(coordinator(200))
        .recommendation_seed(Some(1))
        .build();

    let report = pipeline
        .analyze(EntityType::Email, "alice@example.com")
        .await
        .unwrap();

    for record_type in RecordType::relevant_for(EntityType::Email) {
        assert_eq!(report.metric(record_type.summary_metric()), 0);
        assert!(report.section(record_type.title()).unwrap().is_no_data());
    }
    for category in exposure_scout::scoring::assessed_categories(EntityType::Email) {
        let section = report.section(category.title()).unwrap();
        assert!(section.is_no_data(), "{}", category.title());
    }
    assert_eq!(report.metric("sources_failed"), 3);
}

#[tokio::test]
async fn zero_successful_domain_sources_leave_every_category_without_data() {
    let failing = [
        (SourceId::CrtSh, SourceErrorKind::Unavailable),
        (SourceId::Hunter, SourceErrorKind::AuthMissing),
        (SourceId::TheHarvester, SourceErrorKind::Unavailable),
        (SourceId::Wayback, SourceErrorKind::RateLimited),
        (SourceId::Shodan, SourceErrorKind::AuthMissing),
        (SourceId::VirusTotal, SourceErrorKind::AuthMissing),
        (SourceId::Dns, SourceErrorKind::Unavailable),
        (SourceId::Whois, SourceErrorKind::Unavailable),
    ];
    let pipeline = Pipeline::builder()
        .adapters(
            failing
                .into_iter()
                .map(|(source, kind)| adapter(MockAdapter::new(source).fails(kind)))
                .collect(),
        )
        .coordinator(coordinator(200))
        .rank_lookup(Arc::new(RankList::from_pairs([("example.com", 50)])) as Arc<dyn RankLookup>)
        .recommendation_seed(Some(1))
        .build();

    let report = pipeline.analyze(EntityType::Domain, "example.com").await.unwrap();

    for record_type in RecordType::relevant_for(EntityType::Domain) {
        assert!(report.section(record_type.title()).unwrap().is_no_data());
    }
    for category in exposure_scout::scoring::assessed_categories(EntityType::Domain) {
        let section = report.section(category.title()).unwrap();
        assert!(section.is_no_data(), "{}", category.title());
    }
    assert!(report.section(RiskCategory::Reputation.title()).unwrap().is_no_data());
    assert_eq!(report.metric("sources_failed"), failing.len());
}

#[tokio::test]
async fn same_seed_gives_the_same_report_body() {
    let build = || {
        Pipeline::builder()
            .adapters(vec![adapter(MockAdapter::new(SourceId::Hibp).returns(json!([
                {"Name": "Adobe", "Domain": "adobe.com", "DataClasses": ["Email addresses", "Passwords"]},
                {"Name": "LinkedIn", "Domain": "linkedin.com", "DataClasses": ["Passwords"]}
            ])))])
            .coordinator(coordinator(200))
            .recommendation_seed(Some(9))
            .build()
    };
    let a = build().analyze(EntityType::Email, "alice@example.com").await.unwrap();
    let b = build().analyze(EntityType::Email, "alice@example.com").await.unwrap();

    assert_eq!(a.summary, b.summary);
    assert_eq!(a.sections, b.sections);
    assert_eq!(a.metric("breaches_found"), 2);
    let security = a.section(RiskCategory::Security.title()).unwrap();
    assert!(!security.is_no_data());
}

#[tokio::test]
async fn adapters_for_other_entity_types_are_not_queried() {
    let hibp = Arc::new(MockAdapter::new(SourceId::Hibp).returns(Value::Array(Vec::new())));
    let pipeline = Pipeline::builder()
        .adapters(vec![
            hibp.clone() as Arc<dyn SourceAdapter>,
            adapter(MockAdapter::new(SourceId::CrtSh).returns(json!([
                {"name_value": "www.example.com\nmail.example.com"}
            ]))),
        ])
        .coordinator(coordinator(200))
        .build();

    let report = pipeline.analyze(EntityType::Domain, "example.com").await.unwrap();
    assert_eq!(hibp.calls(), 0);
    assert_eq!(report.metric("sources_attempted"), 1);
    assert_eq!(report.metric("subdomains_found"), 2);
}
