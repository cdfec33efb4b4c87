use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::{Recommendation, RiskAssessment};
use crate::types::{EntityType, MergedRecord, SourceError};

/// Renderer-agnostic output of one analysis run. Renderers read it and never
/// mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub entity_key: String,
    pub entity_type: EntityType,
    pub generated_at: DateTime<Utc>,
    pub summary: BTreeMap<String, usize>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum SectionBody {
    Records(Vec<MergedRecord>),
    Assessment(RiskAssessment),
    Recommendations(Vec<Recommendation>),
    Guidance(Vec<String>),
    SourceErrors(Vec<SourceError>),
    /// Explicit marker for a section that was attempted but has nothing in it.
    NoData { reason: String },
}

impl Section {
    pub fn new(title: impl Into<String>, body: SectionBody) -> Self {
        Self {
            title: title.into(),
            body,
        }
    }

    pub fn no_data(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            title,
            SectionBody::NoData {
                reason: reason.into(),
            },
        )
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.body, SectionBody::NoData { .. })
    }
}

impl Report {
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    pub fn metric(&self, name: &str) -> usize {
        self.summary.get(name).copied().unwrap_or(0)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Exposure Report: {} ({}) ===", self.entity_key, self.entity_type)?;
        writeln!(f, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(f, "\nSummary:")?;
        for (metric, count) in &self.summary {
            writeln!(f, "  {metric:<24} {count}")?;
        }

        for section in &self.sections {
            writeln!(f, "\n{}:", section.title)?;
            match &section.body {
                SectionBody::Records(records) => {
                    for merged in records {
                        let label = merged
                            .record
                            .record_type
                            .key_fields()
                            .iter()
                            .map(|k| merged.record.attr(k).to_string())
                            .collect::<Vec<_>>()
                            .join(" ");
                        let sources = merged
                            .sources
                            .iter()
                            .map(|s| s.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        writeln!(f, "  - {label} [{sources}]")?;
                    }
                }
                SectionBody::Assessment(a) => {
                    writeln!(f, "  Tier: {} (score {:.2})", a.tier, a.score)?;
                    if !a.signals.is_empty() {
                        writeln!(f, "  Signals: {}", a.signals.join(", "))?;
                    }
                    writeln!(f, "  Evidence items: {}", a.evidence.len())?;
                }
                SectionBody::Recommendations(recs) => {
                    for rec in recs {
                        writeln!(f, "  - [{}] {} (impact: {})", rec.applies_to, rec.text, rec.impact)?;
                    }
                }
                SectionBody::Guidance(lines) => {
                    for line in lines {
                        writeln!(f, "  - {line}")?;
                    }
                }
                SectionBody::SourceErrors(errors) => {
                    for e in errors {
                        writeln!(f, "  - {}: {} ({})", e.source_id, e.kind, e.message)?;
                    }
                }
                SectionBody::NoData { reason } => writeln!(f, "  No data: {reason}")?,
            }
        }
        Ok(())
    }
}
