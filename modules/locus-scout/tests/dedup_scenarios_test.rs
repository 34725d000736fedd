//! Scenario-driven aggregation + deduplication tests.
//!
//! Pure pipeline, no controller: agent outputs go through `aggregate` and a
//! `Deduplicator` backed by a deterministic embedder.
//!
//! Run with: cargo test -p locus-scout --test dedup_scenarios_test

use std::sync::Arc;

use locus_common::{LocationRecord, Source};
use locus_scout::agents::AgentOutput;
use locus_scout::pipeline::dedup::{merge_cluster, signature};
use locus_scout::pipeline::{
    aggregate, Candidate, CorroborationPolicy, DedupSettings, Deduplicator,
};
use locus_scout::testing::{FixedEmbedder, TEST_EMBEDDING_DIM};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn output(source: Source, records: Vec<LocationRecord>) -> AgentOutput {
    let mut output = AgentOutput::empty(source);
    output.records = records;
    output
}

fn acme(source: Source, street: &str, city: &str) -> LocationRecord {
    LocationRecord::new(source)
        .with_name("Acme")
        .with_street_address(street)
        .with_city(city)
}

fn padded(values: &[f32]) -> Vec<f32> {
    let mut v = vec![0.0; TEST_EMBEDDING_DIM];
    v[..values.len()].copy_from_slice(values);
    v
}

fn dedup(policy: CorroborationPolicy) -> Deduplicator {
    Deduplicator::new(
        Some(Arc::new(FixedEmbedder::new(TEST_EMBEDDING_DIM))),
        DedupSettings {
            policy,
            ..DedupSettings::default()
        },
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_source_duplicates_get_no_boost() {
    let outputs = vec![output(
        Source::GoogleMaps,
        vec![
            acme(Source::GoogleMaps, "1 Main St", "Springfield"),
            acme(Source::GoogleMaps, "1 Main St", "Springfield"),
        ],
    )];
    let aggregation = aggregate(&outputs);
    let outcome = dedup(CorroborationPolicy::DistinctSources)
        .run(aggregation.candidates)
        .await;

    assert_eq!(outcome.locations.len(), 1);
    let location = &outcome.locations[0];
    assert_eq!(location.member_count, 2);
    assert_eq!(location.sources, vec![Source::GoogleMaps]);
    assert_eq!(location.confidence, 0.9);
}

#[tokio::test]
async fn acme_directory_near_duplicates_merge_at_base_confidence() {
    let hq = LocationRecord::new(Source::GoogleMaps)
        .with_name("Acme HQ")
        .with_street_address("1 Main St")
        .with_city("Springfield");
    let corp = LocationRecord::new(Source::GoogleMaps)
        .with_name("Acme Corp")
        .with_street_address("1 Main St")
        .with_city("Springfield");
    assert_eq!(signature(&hq), "Acme HQ, 1 Main St, Springfield");

    // cosine ≈ 0.95, above the 0.85 threshold
    let embedder = FixedEmbedder::new(TEST_EMBEDDING_DIM)
        .on_text(&signature(&hq), padded(&[1.0, 0.0]))
        .on_text(&signature(&corp), padded(&[0.95, 0.312]));
    let aggregation = aggregate(&[output(Source::GoogleMaps, vec![hq, corp])]);
    let outcome = Deduplicator::new(Some(Arc::new(embedder)), DedupSettings::default())
        .run(aggregation.candidates)
        .await;

    assert!(!outcome.fallback);
    assert_eq!(outcome.locations.len(), 1);
    let location = &outcome.locations[0];
    assert_eq!(location.member_count, 2);
    assert_eq!(location.sources, vec![Source::GoogleMaps]);
    assert_eq!(location.confidence, 0.9);
    assert_eq!(location.record.name.as_deref(), Some("Acme HQ"));

    let conflicts: Vec<&String> = outcome
        .messages
        .iter()
        .filter(|m| m.starts_with("Conflicting name"))
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].contains("kept 'Acme HQ' over 'Acme Corp'"), "{conflicts:?}");
}

#[tokio::test]
async fn all_members_policy_counts_repeats() {
    let outputs = vec![output(
        Source::GoogleMaps,
        vec![
            acme(Source::GoogleMaps, "1 Main St", "Springfield"),
            acme(Source::GoogleMaps, "1 Main St", "Springfield"),
        ],
    )];
    let aggregation = aggregate(&outputs);
    let outcome = dedup(CorroborationPolicy::AllMembers)
        .run(aggregation.candidates)
        .await;

    assert!((outcome.locations[0].confidence - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn every_source_agreeing_is_capped_at_one() {
    let outputs: Vec<AgentOutput> = Source::ALL
        .into_iter()
        .map(|source| output(source, vec![acme(source, "1 Main St", "Springfield")]))
        .collect();
    let aggregation = aggregate(&outputs);
    assert_eq!(aggregation.per_source.len(), 4);

    let outcome = dedup(CorroborationPolicy::DistinctSources)
        .run(aggregation.candidates)
        .await;

    assert_eq!(outcome.locations.len(), 1);
    let location = &outcome.locations[0];
    assert_eq!(location.sources.len(), 4);
    assert_eq!(location.confidence, 1.0);
    assert_eq!(location.record.source, Source::GoogleMaps);
    for source in Source::ALL {
        assert!(location.confidence >= source.base_confidence());
    }
}

#[tokio::test]
async fn distinct_offices_stay_apart() {
    let outputs = vec![
        output(
            Source::GoogleMaps,
            vec![acme(Source::GoogleMaps, "1 Main St", "Springfield")],
        ),
        output(
            Source::Search,
            vec![
                acme(Source::Search, "9 Elm St", "Denver"),
                LocationRecord::new(Source::Search).with_name("Acme"),
            ],
        ),
    ];
    let aggregation = aggregate(&outputs);
    assert_eq!(aggregation.discarded, 1);

    let outcome = dedup(CorroborationPolicy::DistinctSources)
        .run(aggregation.candidates)
        .await;

    let cities: Vec<&str> = outcome
        .locations
        .iter()
        .filter_map(|l| l.record.city.as_deref())
        .collect();
    assert_eq!(cities, vec!["Springfield", "Denver"]);
    assert!(outcome.locations.iter().all(|l| l.member_count == 1));
}

#[tokio::test]
async fn higher_confidence_fields_win_and_gaps_are_filled() {
    let directory = acme(Source::GoogleMaps, "1 Main St", "Springfield").with_phone("(217) 555-0100");
    let website = acme(Source::Website, "1 Main St", "Springfield")
        .with_phone("(217) 555-9999")
        .with_postal_code("62701");
    let outputs = vec![
        output(Source::GoogleMaps, vec![directory]),
        output(Source::Website, vec![website]),
    ];
    let aggregation = aggregate(&outputs);
    let outcome = dedup(CorroborationPolicy::DistinctSources)
        .run(aggregation.candidates)
        .await;

    let merged = &outcome.locations[0].record;
    assert_eq!(merged.phone.as_deref(), Some("(217) 555-0100"));
    assert_eq!(merged.postal_code.as_deref(), Some("62701"));
    assert_eq!(merged.source_confidence, 0.9);
}

#[test]
fn merging_a_merged_location_again_is_stable() {
    let first = Candidate {
        seq: 0,
        record: acme(Source::GoogleMaps, "1 Main St", "Springfield"),
    };
    let second = Candidate {
        seq: 1,
        record: acme(Source::Website, "1 Main St", "Springfield").with_state("IL"),
    };
    let mut messages = Vec::new();
    let merged = merge_cluster(
        &[&first, &second],
        CorroborationPolicy::DistinctSources,
        &mut messages,
    )
    .unwrap();
    assert!(messages.is_empty());

    let again = Candidate {
        seq: 0,
        record: merged.record.clone(),
    };
    let remerged =
        merge_cluster(&[&again], CorroborationPolicy::DistinctSources, &mut messages).unwrap();
    assert_eq!(remerged.record, merged.record);
}
