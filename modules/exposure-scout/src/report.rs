//! Builds the renderer-facing `Report` from a run's results. No I/O.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use exposure_common::{
    EntityType, MergedEntity, Recommendation, RecordType, Report, RiskAssessment, Section,
    SectionBody,
};

use crate::coordinator::AggregateResult;
use crate::recommendations::analyst_guidance;
use crate::scoring::assessed_categories;

pub const RECOMMENDATIONS_TITLE: &str = "Recommendations";
pub const GUIDANCE_TITLE: &str = "Analyst guidance";
pub const SOURCE_ERRORS_TITLE: &str = "Source errors";

pub fn assemble(
    entity_type: EntityType,
    entity_key: &str,
    merged: &MergedEntity,
    assessments: &[RiskAssessment],
    recommendations: &[Recommendation],
    sources: &AggregateResult,
) -> Report {
    assemble_at(
        entity_type,
        entity_key,
        merged,
        assessments,
        recommendations,
        sources,
        Utc::now(),
    )
}

/// `assemble` with the timestamp supplied: identical inputs give identical
/// reports.
pub fn assemble_at(
    entity_type: EntityType,
    entity_key: &str,
    merged: &MergedEntity,
    assessments: &[RiskAssessment],
    recommendations: &[Recommendation],
    sources: &AggregateResult,
    generated_at: DateTime<Utc>,
) -> Report {
    let record_types = RecordType::relevant_for(entity_type);

    let mut summary = BTreeMap::new();
    for record_type in record_types {
        summary.insert(
            record_type.summary_metric().to_string(),
            merged.count_of(*record_type),
        );
    }
    summary.insert("sources_attempted".to_string(), sources.attempted.len());
    summary.insert("sources_failed".to_string(), sources.errors.len());

    let empty_reason = if sources.attempted.is_empty() {
        "no sources were available".to_string()
    } else if sources.all_failed() {
        format!("all {} sources failed", sources.attempted.len())
    } else {
        "nothing found".to_string()
    };

    let mut sections = Vec::new();
    for record_type in record_types {
        let records: Vec<_> = merged.records_of(*record_type).cloned().collect();
        sections.push(if records.is_empty() {
            Section::no_data(record_type.title(), empty_reason.clone())
        } else {
            Section::new(record_type.title(), SectionBody::Records(records))
        });
    }

    for category in assessed_categories(entity_type) {
        sections.push(match assessments.iter().find(|a| a.category == category) {
            Some(a) => Section::new(category.title(), SectionBody::Assessment(a.clone())),
            None => Section::no_data(category.title(), "no applicable signals"),
        });
    }

    let mut seen = HashSet::new();
    let recommendations: Vec<Recommendation> = recommendations
        .iter()
        .filter(|r| seen.insert((r.applies_to, r.text.as_str())))
        .cloned()
        .collect();
    sections.push(if recommendations.is_empty() {
        Section::no_data(RECOMMENDATIONS_TITLE, "no assessed risks")
    } else {
        Section::new(RECOMMENDATIONS_TITLE, SectionBody::Recommendations(recommendations))
    });

    sections.push(Section::new(
        GUIDANCE_TITLE,
        SectionBody::Guidance(
            analyst_guidance(entity_type)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
    ));

    if !sources.errors.is_empty() {
        sections.push(Section::new(
            SOURCE_ERRORS_TITLE,
            SectionBody::SourceErrors(sources.errors.clone()),
        ));
    }

    Report {
        entity_key: entity_key.to_string(),
        entity_type,
        generated_at,
        summary,
        sections,
    }
}
