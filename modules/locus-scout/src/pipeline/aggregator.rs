use std::collections::BTreeMap;

use tracing::{debug, info};

use locus_common::{LocationRecord, Source};

use crate::agents::AgentOutput;

/// Strings that mark a record as a stand-in rather than a real place.
const PLACEHOLDER_INDICATORS: &[&str] = &[
    "location search attempted",
    "no results",
    "various sources checked",
    "search performed",
    "unknown location",
    "test location",
    "example location",
    "sample location",
    "dummy location",
    "mock location",
];

/// A record admitted to deduplication, tagged with its arrival order.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub seq: usize,
    pub record: LocationRecord,
}

#[derive(Debug, Default)]
pub struct Aggregation {
    pub candidates: Vec<Candidate>,
    /// Admitted records per source.
    pub per_source: BTreeMap<Source, usize>,
    pub discarded: usize,
}

/// Concatenate agent outputs in registration order, discard records with
/// no city or street and placeholder records, and number the rest.
pub fn aggregate(outputs: &[AgentOutput]) -> Aggregation {
    let mut aggregation = Aggregation::default();

    for record in outputs.iter().flat_map(|o| o.records.iter()) {
        if !record.has_location_info() {
            debug!(source = %record.source, name = ?record.name, "Discarded record without city or street");
            aggregation.discarded += 1;
            continue;
        }
        if let Some(indicator) = placeholder_indicator(record) {
            info!(source = %record.source, name = ?record.name, indicator, "Discarded placeholder location");
            aggregation.discarded += 1;
            continue;
        }

        *aggregation.per_source.entry(record.source).or_default() += 1;
        aggregation.candidates.push(Candidate {
            seq: aggregation.candidates.len(),
            record: record.clone(),
        });
    }

    aggregation
}

fn placeholder_indicator(record: &LocationRecord) -> Option<&'static str> {
    [&record.name, &record.city, &record.street_address]
        .into_iter()
        .flatten()
        .map(|value| value.to_lowercase())
        .find_map(|value| {
            PLACEHOLDER_INDICATORS
                .iter()
                .copied()
                .find(|ind| value.contains(ind))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(source: Source, records: Vec<LocationRecord>) -> AgentOutput {
        let mut output = AgentOutput::empty(source);
        output.records = records;
        output
    }

    #[test]
    fn preserves_registration_order_and_numbers_records() {
        let outputs = vec![
            output(
                Source::GoogleMaps,
                vec![
                    LocationRecord::new(Source::GoogleMaps).with_city("Austin"),
                    LocationRecord::new(Source::GoogleMaps).with_city("Boston"),
                ],
            ),
            output(
                Source::Website,
                vec![LocationRecord::new(Source::Website).with_street_address("1 Main St")],
            ),
        ];
        let agg = aggregate(&outputs);
        let seqs: Vec<usize> = agg.candidates.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(agg.candidates[2].record.source, Source::Website);
        assert_eq!(agg.per_source[&Source::GoogleMaps], 2);
        assert_eq!(agg.per_source[&Source::Website], 1);
    }

    #[test]
    fn discards_records_without_location() {
        let outputs = vec![output(
            Source::Search,
            vec![
                LocationRecord::new(Source::Search).with_name("Acme"),
                LocationRecord::new(Source::Search).with_city("Denver"),
            ],
        )];
        let agg = aggregate(&outputs);
        assert_eq!(agg.candidates.len(), 1);
        assert_eq!(agg.discarded, 1);
        assert_eq!(agg.candidates[0].seq, 0);
    }

    #[test]
    fn discards_placeholders() {
        let outputs = vec![output(
            Source::Search,
            vec![
                LocationRecord::new(Source::Search)
                    .with_name("Location search attempted")
                    .with_city("Various"),
                LocationRecord::new(Source::Search).with_city("Unknown Location"),
                LocationRecord::new(Source::Search)
                    .with_name("Acme Test Lab")
                    .with_city("Phoenix"),
            ],
        )];
        let agg = aggregate(&outputs);
        assert_eq!(agg.candidates.len(), 1);
        assert_eq!(agg.candidates[0].record.city.as_deref(), Some("Phoenix"));
        assert!(!agg.per_source.is_empty());
    }
}
