use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::NormalizedRecord;

/// Popularity ranks below this are critical targets.
pub const RANK_CRITICAL_BELOW: u64 = 1_000;
/// Ranks below this (and at or above the critical bound) are high.
pub const RANK_HIGH_BELOW: u64 = 10_000;
/// Ranks below this (and at or above the high bound) are medium.
pub const RANK_MEDIUM_BELOW: u64 = 100_000;

/// Weighted rule scores at or above this are critical.
pub const SCORE_CRITICAL_AT: f64 = 8.0;
pub const SCORE_HIGH_AT: f64 = 4.0;
pub const SCORE_MEDIUM_AT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Privacy,
    Reputation,
    Security,
    Configuration,
    LegalCompliance,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::Privacy,
        RiskCategory::Reputation,
        RiskCategory::Security,
        RiskCategory::Configuration,
        RiskCategory::LegalCompliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Privacy => "privacy",
            RiskCategory::Reputation => "reputation",
            RiskCategory::Security => "security",
            RiskCategory::Configuration => "configuration",
            RiskCategory::LegalCompliance => "legal_compliance",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RiskCategory::Privacy => "Privacy risk",
            RiskCategory::Reputation => "Reputation risk",
            RiskCategory::Security => "Security risk",
            RiskCategory::Configuration => "Configuration risk",
            RiskCategory::LegalCompliance => "Legal compliance risk",
        }
    }

    /// What the category measures, as shown to analysts.
    pub fn description(&self) -> &'static str {
        match self {
            RiskCategory::Privacy => "Unauthorized disclosure of personal information.",
            RiskCategory::Reputation => "Damage to the reputation of the person or organization.",
            RiskCategory::Security => "Unauthorized access to accounts or sensitive data.",
            RiskCategory::Configuration => "Settings or infrastructure that weaken privacy.",
            RiskCategory::LegalCompliance => "Breach of legal and regulatory obligations.",
        }
    }

    /// Multiplier applied to summed rule weights (ISO 27001-style criticality).
    pub fn factor(&self) -> f64 {
        match self {
            RiskCategory::Privacy => 0.8,
            RiskCategory::Reputation => 0.6,
            RiskCategory::Security => 0.9,
            RiskCategory::Configuration => 0.7,
            RiskCategory::LegalCompliance => 0.5,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative risk tier. Ordered by severity: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Tier for a popularity rank. Unknown ranks never escalate.
    pub fn from_rank(rank: Option<u64>) -> Self {
        match rank {
            Some(r) if r < RANK_CRITICAL_BELOW => RiskTier::Critical,
            Some(r) if r < RANK_HIGH_BELOW => RiskTier::High,
            Some(r) if r < RANK_MEDIUM_BELOW => RiskTier::Medium,
            _ => RiskTier::Low,
        }
    }

    pub fn from_weighted_score(score: f64) -> Self {
        if score >= SCORE_CRITICAL_AT {
            RiskTier::Critical
        } else if score >= SCORE_HIGH_AT {
            RiskTier::High
        } else if score >= SCORE_MEDIUM_AT {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn points(&self) -> f64 {
        match self {
            RiskTier::Low => 1.0,
            RiskTier::Medium => 2.0,
            RiskTier::High => 3.0,
            RiskTier::Critical => 4.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category's verdict for one run. Never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub entity_key: String,
    pub category: RiskCategory,
    pub tier: RiskTier,
    pub score: f64,
    /// Names of the rules or rank lookups that contributed.
    pub signals: Vec<String>,
    pub evidence: Vec<NormalizedRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// The impact level a tier calls for first.
    pub fn preferred_for(tier: RiskTier) -> Self {
        match tier {
            RiskTier::Critical | RiskTier::High => Impact::High,
            RiskTier::Medium => Impact::Medium,
            RiskTier::Low => Impact::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    pub impact: Impact,
    pub applies_to: RiskCategory,
}
