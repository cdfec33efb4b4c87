use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::info;

use exposure_common::{
    EntityType, ExposureError, Impact, Recommendation, RiskAssessment, RiskCategory,
};

const BUILTIN: &[(RiskCategory, Impact, &str)] = &[
    // privacy
    (RiskCategory::Privacy, Impact::High, "Remove or lock down profiles that expose employer, role or moderation status."),
    (RiskCategory::Privacy, Impact::High, "Request removal of the leaked records from data brokers and breach aggregators."),
    (RiskCategory::Privacy, Impact::Medium, "Use distinct usernames and email aliases per service to limit correlation."),
    (RiskCategory::Privacy, Impact::Medium, "Review what each public profile reveals and trim biographical details."),
    (RiskCategory::Privacy, Impact::Low, "Periodically search for the identifier to catch new exposures early."),
    // reputation
    (RiskCategory::Reputation, Impact::High, "Audit public content on the flagged accounts and remove anything damaging."),
    (RiskCategory::Reputation, Impact::High, "Claim dormant or low-activity accounts so they cannot be impersonated."),
    (RiskCategory::Reputation, Impact::Medium, "Set up alerts for new mentions of the identifier on major platforms."),
    (RiskCategory::Reputation, Impact::Low, "Keep profile information consistent across platforms."),
    // security
    (RiskCategory::Security, Impact::High, "Rotate every password exposed in a breach and stop reusing it anywhere."),
    (RiskCategory::Security, Impact::High, "Enable multi-factor authentication on all accounts tied to this identifier."),
    (RiskCategory::Security, Impact::High, "Close or firewall publicly exposed administrative and database ports."),
    (RiskCategory::Security, Impact::Medium, "Patch services with published CVEs and track them in a vulnerability register."),
    (RiskCategory::Security, Impact::Medium, "Adopt a password manager with unique generated credentials."),
    (RiskCategory::Security, Impact::Low, "Subscribe to breach notification services for early warning."),
    // configuration
    (RiskCategory::Configuration, Impact::High, "Take staging, development and internal hosts off the public internet."),
    (RiskCategory::Configuration, Impact::Medium, "Review account privacy settings on every platform where a profile was found."),
    (RiskCategory::Configuration, Impact::Medium, "Monitor certificate transparency logs for unexpected subdomains."),
    (RiskCategory::Configuration, Impact::Low, "Retire unused DNS records and archived endpoints."),
    // legal compliance
    (RiskCategory::LegalCompliance, Impact::High, "Assess whether exposed personal data triggers breach notification duties."),
    (RiskCategory::LegalCompliance, Impact::Medium, "Review adult or restricted content associations against applicable policies."),
    (RiskCategory::LegalCompliance, Impact::Medium, "Document data subject requests sent to platforms and brokers."),
    (RiskCategory::LegalCompliance, Impact::Low, "Keep a record of the legal basis for any follow-up investigation."),
];

/// Static recommendation catalog, loaded once at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    entries: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    recommendation: Vec<Recommendation>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(category, impact, text)| Recommendation {
                    text: text.to_string(),
                    impact: *impact,
                    applies_to: *category,
                })
                .collect(),
        }
    }

    /// A TOML catalog of `[[recommendation]]` tables (`text`, `impact`,
    /// `applies_to`). Replaces the built-in catalog entirely.
    pub fn load(path: &Path) -> Result<Self, ExposureError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExposureError::Catalog(format!("Failed to read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_toml_str(&content)
            .map_err(|e| ExposureError::Catalog(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), entries = catalog.len(), "Recommendation catalog loaded");
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ExposureError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| ExposureError::Catalog(e.to_string()))?;
        if let Some(blank) = file.recommendation.iter().position(|r| r.text.trim().is_empty()) {
            return Err(ExposureError::Catalog(format!(
                "recommendation #{} has empty text",
                blank + 1
            )));
        }
        Ok(Self {
            entries: file.recommendation,
        })
    }

    pub fn for_category(&self, category: RiskCategory) -> impl Iterator<Item = &Recommendation> {
        self.entries.iter().filter(move |r| r.applies_to == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Picks recommendations for assessments from an injected random source.
/// The same seed over the same assessments yields the same picks.
pub struct RecommendationSelector {
    rng: StdRng,
    per_assessment: usize,
}

impl RecommendationSelector {
    pub fn seeded(seed: u64, per_assessment: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            per_assessment,
        }
    }

    /// Unseeded selector for production runs that want variety.
    pub fn from_os_rng(per_assessment: usize) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            per_assessment,
        }
    }

    /// Up to `per_assessment` items for the assessment's category, drawn
    /// first from the impact level its tier calls for.
    pub fn select(&mut self, assessment: &RiskAssessment, catalog: &Catalog) -> Vec<Recommendation> {
        let wanted = Impact::preferred_for(assessment.tier);
        let (preferred, rest): (Vec<&Recommendation>, Vec<&Recommendation>) = catalog
            .for_category(assessment.category)
            .partition(|r| r.impact == wanted);

        let mut picked: Vec<Recommendation> = preferred
            .choose_multiple(&mut self.rng, self.per_assessment)
            .map(|r| (*r).clone())
            .collect();
        let short = self.per_assessment.saturating_sub(picked.len());
        if short > 0 {
            picked.extend(
                rest.choose_multiple(&mut self.rng, short)
                    .map(|r| (*r).clone()),
            );
        }
        picked
    }
}

/// Fixed guidance printed at the end of every report for the entity type.
pub fn analyst_guidance(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Username => &[
            "Manually verify high-value profiles for accuracy.",
            "Cross-check findings with other OSINT tools and sources.",
            "Prioritize platforms with strong matches or recent activity.",
            "Document all sources, timestamps, and evidence.",
            "Consider privacy, legal, and ethical guidelines before action.",
        ],
        EntityType::Email => &[
            "Verify high-value leaks for accuracy.",
            "Cross-check findings with other OSINT sources.",
            "Prioritize recent and multiple-source leaks.",
            "Document all sources and timestamps.",
            "Respect privacy and legal guidelines.",
        ],
        EntityType::Domain => &[
            "Cross-check all subdomains and emails with other OSINT sources.",
            "Monitor DNS and certificate changes for suspicious activity.",
            "Document all findings, sources, and timestamps.",
            "Consider privacy, legal, and ethical guidelines before action.",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_common::RiskTier;
    use std::io::Write;

    fn assessment(category: RiskCategory, tier: RiskTier) -> RiskAssessment {
        RiskAssessment {
            entity_key: "alice".into(),
            category,
            tier,
            score: 0.0,
            signals: Vec::new(),
            evidence: Vec::new(),
        }
    }

    #[test]
    fn builtin_catalog_covers_every_category() {
        let catalog = Catalog::builtin();
        for category in RiskCategory::ALL {
            assert!(catalog.for_category(category).count() >= 4, "{category}");
        }
    }

    #[test]
    fn same_seed_same_picks() {
        let catalog = Catalog::builtin();
        let a = assessment(RiskCategory::Security, RiskTier::Critical);
        let first = RecommendationSelector::seeded(7, 2).select(&a, &catalog);
        let second = RecommendationSelector::seeded(7, 2).select(&a, &catalog);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn picks_match_category_and_prefer_tier_impact() {
        let catalog = Catalog::builtin();
        let a = assessment(RiskCategory::Security, RiskTier::High);
        let picks = RecommendationSelector::seeded(1, 2).select(&a, &catalog);
        assert!(picks.iter().all(|r| r.applies_to == RiskCategory::Security));
        assert!(picks.iter().all(|r| r.impact == Impact::High));
    }

    #[test]
    fn short_preferred_pool_is_filled_from_the_rest() {
        let catalog = Catalog::builtin();
        // Reputation has a single low-impact entry.
        let a = assessment(RiskCategory::Reputation, RiskTier::Low);
        let picks = RecommendationSelector::seeded(3, 3).select(&a, &catalog);
        assert_eq!(picks.len(), 3);
        assert_eq!(picks[0].impact, Impact::Low);
    }

    #[test]
    fn toml_catalog_replaces_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[recommendation]]
text = "Rotate keys"
impact = "high"
applies_to = "security"
"#
        )
        .unwrap();
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.for_category(RiskCategory::Privacy).count(), 0);
    }

    #[test]
    fn malformed_catalogs_are_rejected() {
        assert!(Catalog::from_toml_str("[[recommendation]]\ntext = \"x\"\nimpact = \"severe\"\napplies_to = \"privacy\"").is_err());
        assert!(Catalog::from_toml_str("[[recommendation]]\ntext = \" \"\nimpact = \"low\"\napplies_to = \"privacy\"").is_err());
    }
}
