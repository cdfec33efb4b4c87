//! Collapses records that describe the same item into one logical record.
//!
//! Records group by `(record_type, equality key)`. Output keeps the order in
//! which each item first appeared; the representative record and its source
//! set do not depend on input order.

use std::collections::{btree_map, hash_map, BTreeSet, HashMap};

use tracing::{debug, warn};

use exposure_common::{EntityType, MergedEntity, MergedRecord, NormalizedRecord, RecordType};

pub fn merge(
    entity_type: EntityType,
    entity_key: &str,
    records: Vec<NormalizedRecord>,
) -> MergedEntity {
    let total = records.len();
    let mut groups: Vec<Vec<NormalizedRecord>> = Vec::new();
    let mut index: HashMap<(RecordType, String), usize> = HashMap::new();
    let mut entity = MergedEntity::empty(entity_type, entity_key);

    for record in records {
        if record.entity_key != entity_key {
            warn!(
                expected = entity_key,
                found = record.entity_key.as_str(),
                source = %record.source_id,
                "Dropping record for a different entity"
            );
            continue;
        }
        entity.provenance.insert(record.source_id);

        match record.equality_key() {
            Some(key) => match index.entry((record.record_type, key)) {
                hash_map::Entry::Occupied(slot) => groups[*slot.get()].push(record),
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(groups.len());
                    groups.push(vec![record]);
                }
            },
            // No key: never collapsed with anything.
            None => groups.push(vec![record]),
        }
    }

    entity.records = groups.into_iter().filter_map(combine).collect();
    debug!(
        entity_key,
        before = total,
        after = entity.records.len(),
        "Merged records"
    );
    entity
}

/// Representative of one group. Contributions are applied in a fixed order
/// (source, then attributes), so a known value from a lower source wins and
/// unknowns are filled from the rest.
fn combine(mut group: Vec<NormalizedRecord>) -> Option<MergedRecord> {
    group.sort_by(|a, b| {
        a.source_id
            .cmp(&b.source_id)
            .then_with(|| a.attributes.cmp(&b.attributes))
    });

    let sources: BTreeSet<_> = group.iter().map(|r| r.source_id).collect();
    let confidence = group.iter().map(|r| r.confidence).fold(0.0_f32, f32::max);

    let mut contributions = group.into_iter();
    let mut representative = contributions.next()?;
    for other in contributions {
        for (name, value) in other.attributes {
            match representative.attributes.entry(name) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                btree_map::Entry::Occupied(mut slot) => {
                    if !slot.get().is_known() {
                        slot.insert(value);
                    }
                }
            }
        }
    }
    representative.confidence = confidence;

    Some(MergedRecord {
        record: representative,
        sources,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{breach, canonical, profile, subdomain};
    use exposure_common::{AttrValue, SourceId};

    #[test]
    fn same_url_from_two_sources_is_one_profile() {
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
        let sources: Vec<_> = merged.records[0].sources.iter().copied().collect();
        assert_eq!(sources, vec![SourceId::Sherlock, SourceId::Maigret]);
        assert!(merged.provenance.contains(&SourceId::Sherlock));
        assert!(merged.provenance.contains(&SourceId::Maigret));
    }

    #[test]
    fn keyless_records_are_never_collapsed() {
        let blank = || {
            NormalizedRecord::new("alice", RecordType::ProfileMatch, SourceId::Sherlock)
                .with("url", AttrValue::Unknown)
        };
        let merged = merge(EntityType::Username, "alice", vec![blank(), blank()]);
        assert_eq!(merged.records.len(), 2);
    }

    #[test]
    fn same_key_different_type_stays_apart() {
        let a = subdomain("example.com", SourceId::CrtSh, "x.example.com");
        let b = NormalizedRecord::new("example.com", RecordType::EmailAddress, SourceId::Hunter)
            .with("address", AttrValue::text("x.example.com"));
        let merged = merge(EntityType::Domain, "example.com", vec![a, b]);
        assert_eq!(merged.records.len(), 2);
    }

    #[test]
    fn lower_source_wins_conflicts_and_unknowns_are_filled() {
        let maigret = profile("alice", SourceId::Maigret, "https://r.com/alice")
            .with("site", AttrValue::text("Reddit"))
            .with("total_karma", AttrValue::Int(12));
        let sherlock = profile("alice", SourceId::Sherlock, "https://r.com/alice")
            .with("site", AttrValue::text("reddit"))
            .with("total_karma", AttrValue::Unknown);

        let merged = merge(EntityType::Username, "alice", vec![maigret, sherlock]);
        let record = &merged.records[0].record;
        assert_eq!(record.text("site"), Some("reddit"));
        assert_eq!(record.int("total_karma"), Some(12));
        assert_eq!(record.source_id, SourceId::Sherlock);
        assert!((record.confidence - SourceId::Maigret.base_confidence()).abs() < f32::EPSILON);
    }

    #[test]
    fn first_appearance_order_is_kept() {
        let merged = merge(
            EntityType::Email,
            "a@b.com",
            vec![
                breach("a@b.com", SourceId::Hibp, "Zynga"),
                breach("a@b.com", SourceId::Hibp, "Adobe"),
                breach("a@b.com", SourceId::BreachDirectory, "Zynga"),
            ],
        );
        let names: Vec<_> = merged
            .records
            .iter()
            .filter_map(|r| r.record.text("breach_source"))
            .collect();
        assert_eq!(names, vec!["Zynga", "Adobe"]);
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let records = vec![
            profile("alice", SourceId::Maigret, "https://a.com/alice").with("site", AttrValue::text("A")),
            profile("alice", SourceId::Sherlock, "https://a.com/alice").with("site", AttrValue::text("a")),
            profile("alice", SourceId::Sherlock, "https://b.com/alice"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let forward = merge(EntityType::Username, "alice", records);
        let backward = merge(EntityType::Username, "alice", reversed);
        assert_eq!(canonical(&forward), canonical(&backward));
        assert_eq!(forward.provenance, backward.provenance);
    }

    #[test]
    fn foreign_entity_records_are_dropped() {
        let merged = merge(
            EntityType::Username,
            "alice",
            vec![profile("bob", SourceId::Sherlock, "https://x.com/bob")],
        );
        assert!(merged.is_empty());
        assert!(merged.provenance.is_empty());
    }
}
