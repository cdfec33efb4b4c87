//! Risk scoring over a merged entity.
//!
//! Each `(entity type, category)` pair is scored by exactly one named
//! strategy: additive rule weights, or a popularity-rank lookup. Both are
//! deterministic for identical inputs.

pub mod rank;
pub mod rules;

pub use rank::RankList;
pub use rules::Rule;

use std::collections::BTreeSet;

use tracing::debug;

use exposure_common::{
    EntityType, MergedEntity, NormalizedRecord, RecordType, RiskAssessment, RiskCategory, RiskTier,
};

use crate::traits::RankLookup;

/// What a rank-scored category looks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankTarget {
    /// The entity key itself (a domain).
    EntityKey,
    /// The `domain` attribute of records of these types.
    RecordDomains(&'static [RecordType]),
}

#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    Rules(&'static [Rule]),
    Rank(RankTarget),
}

/// The strategy for a category, or `None` when the category is not assessed
/// for this entity type.
pub fn strategy_for(entity_type: EntityType, category: RiskCategory) -> Option<Strategy> {
    use RiskCategory::*;
    let strategy = match (entity_type, category) {
        (EntityType::Username, Privacy) => Strategy::Rules(rules::USERNAME_PRIVACY),
        (EntityType::Username, Reputation) => Strategy::Rules(rules::USERNAME_REPUTATION),
        (EntityType::Username, Security) => Strategy::Rules(rules::USERNAME_SECURITY),
        (EntityType::Username, Configuration) => Strategy::Rules(rules::USERNAME_CONFIGURATION),
        (EntityType::Username, LegalCompliance) => Strategy::Rules(rules::USERNAME_LEGAL),

        (EntityType::Email, Privacy) => Strategy::Rank(RankTarget::RecordDomains(&[
            RecordType::Breach,
            RecordType::ServiceAccount,
        ])),
        (EntityType::Email, Reputation) => Strategy::Rules(rules::EMAIL_REPUTATION),
        (EntityType::Email, Security) => Strategy::Rules(rules::EMAIL_SECURITY),

        (EntityType::Domain, Privacy) => Strategy::Rules(rules::DOMAIN_PRIVACY),
        (EntityType::Domain, Reputation) => Strategy::Rank(RankTarget::EntityKey),
        (EntityType::Domain, Security) => Strategy::Rules(rules::DOMAIN_SECURITY),
        (EntityType::Domain, Configuration) => Strategy::Rules(rules::DOMAIN_CONFIGURATION),

        _ => return None,
    };
    Some(strategy)
}

/// Categories that have a strategy for this entity type, in category order.
pub fn assessed_categories(entity_type: EntityType) -> Vec<RiskCategory> {
    RiskCategory::ALL
        .into_iter()
        .filter(|c| strategy_for(entity_type, *c).is_some())
        .collect()
}

/// One assessment per category with at least one applicable signal.
pub fn score(entity: &MergedEntity, rank_lookup: &dyn RankLookup) -> Vec<RiskAssessment> {
    RiskCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let assessment = match strategy_for(entity.entity_type, category)? {
                Strategy::Rules(rules) => score_rules(entity, category, rules),
                Strategy::Rank(target) => score_rank(entity, category, target, rank_lookup),
            };
            if let Some(a) = &assessment {
                debug!(
                    category = %a.category,
                    tier = %a.tier,
                    score = a.score,
                    signals = a.signals.len(),
                    "Category scored"
                );
            }
            assessment
        })
        .collect()
}

fn score_rules(
    entity: &MergedEntity,
    category: RiskCategory,
    rules: &[Rule],
) -> Option<RiskAssessment> {
    let mut total = 0.0;
    let mut signals = BTreeSet::new();
    let mut evidence: Vec<NormalizedRecord> = Vec::new();

    for merged in &entity.records {
        let mut hit = false;
        for rule in rules.iter().filter(|r| r.matches(&merged.record)) {
            total += rule.weight;
            signals.insert(rule.name.to_string());
            hit = true;
        }
        if hit {
            evidence.push(merged.record.clone());
        }
    }

    if signals.is_empty() {
        return None;
    }
    let score = total * category.factor();
    Some(RiskAssessment {
        entity_key: entity.entity_key.clone(),
        category,
        tier: RiskTier::from_weighted_score(score),
        score,
        signals: signals.into_iter().collect(),
        evidence,
    })
}

fn score_rank(
    entity: &MergedEntity,
    category: RiskCategory,
    target: RankTarget,
    rank_lookup: &dyn RankLookup,
) -> Option<RiskAssessment> {
    // (identifier, rank, record the identifier came from)
    let lookups: Vec<(String, Option<u64>, Option<&NormalizedRecord>)> = match target {
        // A key no source said anything about is not assessed.
        RankTarget::EntityKey if entity.is_empty() => return None,
        RankTarget::EntityKey => {
            vec![(entity.entity_key.clone(), rank_lookup.rank(&entity.entity_key), None)]
        }
        RankTarget::RecordDomains(types) => entity
            .records
            .iter()
            .filter(|m| types.contains(&m.record_type()))
            .filter_map(|m| {
                let domain = m.record.text("domain")?;
                Some((domain.to_string(), rank_lookup.rank(domain), Some(&m.record)))
            })
            .collect(),
    };
    if lookups.is_empty() {
        return None;
    }

    let tier = lookups
        .iter()
        .map(|(_, rank, _)| RiskTier::from_rank(*rank))
        .max()
        .unwrap_or(RiskTier::Low);
    let any_known = lookups.iter().any(|(_, rank, _)| rank.is_some());

    let mut signals = BTreeSet::new();
    let mut evidence = Vec::new();
    for (identifier, rank, record) in &lookups {
        if RiskTier::from_rank(*rank) != tier {
            continue;
        }
        signals.insert(match rank {
            Some(r) => format!("rank:{identifier}={r}"),
            None => format!("rank:{identifier}=unknown"),
        });
        if let Some(record) = record {
            if !evidence.contains(*record) {
                evidence.push((*record).clone());
            }
        }
    }

    Some(RiskAssessment {
        entity_key: entity.entity_key.clone(),
        category,
        tier,
        score: if any_known { tier.points() } else { 0.0 },
        signals: signals.into_iter().collect(),
        evidence,
    })
}
