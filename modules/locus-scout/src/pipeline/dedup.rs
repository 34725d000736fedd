// Deduplication and conflict resolution.
//
// Each candidate gets a signature (name + street + city, missing fields
// omitted). Signatures are embedded and any pair at or above the similarity
// threshold is joined; clusters are the connected components of that graph.
// Identical normalized signatures always join, embedder or not.
//
// Without a usable embedder the pass degrades to exact matching on
// normalized name + city (street when city is missing).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{info, warn};

use locus_common::{LocationField, LocationRecord, ScoredLocation, Source};

use super::aggregator::Candidate;
use crate::infra::util::{cosine_similarity, normalize_text};
use crate::traits::TextEmbedder;

/// Default cosine similarity at or above which two signatures match.
pub const SIMILARITY_THRESHOLD: f32 = 0.85;

/// Confidence gained per corroborating contributor.
pub const CORROBORATION_BOOST: f64 = 0.05;

/// What counts as corroboration inside a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorroborationPolicy {
    /// Only distinct sources raise confidence.
    #[default]
    DistinctSources,
    /// Every extra member raises confidence.
    AllMembers,
}

#[derive(Debug, Clone, Copy)]
pub struct DedupSettings {
    pub threshold: f32,
    pub policy: CorroborationPolicy,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            threshold: SIMILARITY_THRESHOLD,
            policy: CorroborationPolicy::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub locations: Vec<ScoredLocation>,
    pub messages: Vec<String>,
    /// True when the exact-match fallback was used.
    pub fallback: bool,
}

pub struct Deduplicator {
    embedder: Option<Arc<dyn TextEmbedder>>,
    settings: DedupSettings,
}

impl Deduplicator {
    pub fn new(embedder: Option<Arc<dyn TextEmbedder>>, settings: DedupSettings) -> Self {
        Self { embedder, settings }
    }

    pub async fn run(&self, candidates: Vec<Candidate>) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        if candidates.is_empty() {
            return outcome;
        }

        let clusters = match self.embedding_clusters(&candidates).await {
            Some(clusters) => clusters,
            None => {
                outcome.fallback = true;
                outcome
                    .messages
                    .push("Embedding backend unavailable - used exact-match deduplication".into());
                exact_clusters(&candidates)
            }
        };

        for members in &clusters {
            let members: Vec<&Candidate> = members.iter().map(|&i| &candidates[i]).collect();
            if let Some(location) =
                merge_cluster(&members, self.settings.policy, &mut outcome.messages)
            {
                outcome.locations.push(location);
            }
        }

        info!(
            candidates = candidates.len(),
            clusters = outcome.locations.len(),
            fallback = outcome.fallback,
            "Deduplication complete"
        );
        outcome
    }

    /// `None` means the embedder is missing or unusable for this batch.
    async fn embedding_clusters(&self, candidates: &[Candidate]) -> Option<Vec<Vec<usize>>> {
        let embedder = self.embedder.as_ref()?;
        let signatures: Vec<String> = candidates.iter().map(|c| signature(&c.record)).collect();

        let vectors = match embedder.embed_batch(signatures.clone()).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(error = %e, "Embedding failed, falling back to exact matching");
                return None;
            }
        };
        if vectors.len() != signatures.len() || vectors.iter().any(|v| v.is_empty()) {
            warn!(
                expected = signatures.len(),
                got = vectors.len(),
                "Embedding batch unusable, falling back to exact matching"
            );
            return None;
        }

        let normalized: Vec<String> = signatures.iter().map(|s| normalize_text(s)).collect();
        let mut sets = DisjointSet::new(candidates.len());
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                if normalized[i] == normalized[j]
                    || cosine_similarity(&vectors[i], &vectors[j]) >= self.settings.threshold as f64
                {
                    sets.union(i, j);
                }
            }
        }
        Some(sets.components())
    }
}

/// "name, street, city" with missing fields omitted.
pub fn signature(record: &LocationRecord) -> String {
    [
        record.field(LocationField::Name),
        record.field(LocationField::StreetAddress),
        record.field(LocationField::City),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

/// Exact-match key: normalized name + city, or street when city is missing.
fn fallback_key(record: &LocationRecord) -> String {
    let name = record.field(LocationField::Name).map(normalize_text).unwrap_or_default();
    let place = record
        .field(LocationField::City)
        .or_else(|| record.field(LocationField::StreetAddress))
        .map(normalize_text)
        .unwrap_or_default();
    format!("{name}|{place}")
}

fn exact_clusters(candidates: &[Candidate]) -> Vec<Vec<usize>> {
    let mut sets = DisjointSet::new(candidates.len());
    let mut first_by_key: HashMap<String, usize> = HashMap::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let key = fallback_key(&candidate.record);
        match first_by_key.get(&key) {
            Some(&first) => sets.union(first, i),
            None => {
                first_by_key.insert(key, i);
            }
        }
    }
    sets.components()
}

/// `min(1.0, base + 0.05 × (n − 1))`.
pub fn cross_validated_confidence(base: f64, corroborators: usize) -> f64 {
    let boost = CORROBORATION_BOOST * corroborators.saturating_sub(1) as f64;
    (base + boost).min(1.0)
}

/// Collapse one cluster into a scored location.
///
/// Each field comes from the highest-confidence member that has it. When
/// equally confident members disagree, the value backed by more distinct
/// sources wins, then the earliest. Disagreements are reported in
/// `messages`.
pub fn merge_cluster(
    members: &[&Candidate],
    policy: CorroborationPolicy,
    messages: &mut Vec<String>,
) -> Option<ScoredLocation> {
    let mut members: Vec<&Candidate> = members.to_vec();
    members.sort_by_key(|c| c.seq);

    let sources = distinct_sources(&members);

    if let [only] = members.as_slice() {
        return Some(ScoredLocation {
            confidence: only.record.source_confidence,
            record: only.record.clone(),
            sources,
            member_count: 1,
        });
    }

    // Earliest member wins confidence ties.
    let primary = &members
        .iter()
        .copied()
        .reduce(|best, c| {
            if c.record.source_confidence > best.record.source_confidence {
                c
            } else {
                best
            }
        })?
        .record;

    let base = primary.source_confidence;
    let mut merged = primary.clone();
    let label = signature(primary);

    for field in LocationField::ALL {
        let value = resolve_field(&members, field, &label, messages);
        merged.set_field(field, value);
    }

    if let Some(coords) = members
        .iter()
        .filter(|c| c.record.latitude.is_some() && c.record.longitude.is_some())
        .reduce(|best, c| {
            if c.record.source_confidence > best.record.source_confidence {
                c
            } else {
                best
            }
        })
    {
        merged.latitude = coords.record.latitude;
        merged.longitude = coords.record.longitude;
    }
    merged.source_confidence = base;

    let corroborators = match policy {
        CorroborationPolicy::DistinctSources => sources.len(),
        CorroborationPolicy::AllMembers => members.len(),
    };

    Some(ScoredLocation {
        record: merged,
        confidence: cross_validated_confidence(base, corroborators),
        sources,
        member_count: members.len(),
    })
}

fn distinct_sources(members: &[&Candidate]) -> Vec<Source> {
    let mut sources = Vec::new();
    for member in members {
        if !sources.contains(&member.record.source) {
            sources.push(member.record.source);
        }
    }
    sources
}

/// Normalized value's backing among equally confident members.
struct Backing<'a> {
    spelling: &'a str,
    first_seq: usize,
    sources: Vec<Source>,
}

/// Pick one value for `field`. `members` must be sorted by seq.
fn resolve_field(
    members: &[&Candidate],
    field: LocationField,
    label: &str,
    messages: &mut Vec<String>,
) -> Option<String> {
    let holders: Vec<(&Candidate, &str)> = members
        .iter()
        .filter_map(|c| c.record.field(field).map(|v| (*c, v)))
        .collect();

    let top = holders
        .iter()
        .map(|(c, _)| c.record.source_confidence)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut backing: BTreeMap<String, Backing<'_>> = BTreeMap::new();
    for &(candidate, value) in holders
        .iter()
        .filter(|(c, _)| c.record.source_confidence == top)
    {
        let entry = backing.entry(normalize_text(value)).or_insert(Backing {
            spelling: value,
            first_seq: candidate.seq,
            sources: Vec::new(),
        });
        if !entry.sources.contains(&candidate.record.source) {
            entry.sources.push(candidate.record.source);
        }
    }

    let winner = backing
        .values()
        .max_by(|a, b| {
            a.sources
                .len()
                .cmp(&b.sources.len())
                .then(b.first_seq.cmp(&a.first_seq))
        })?
        .spelling;

    if backing.len() > 1 {
        let losers: Vec<&str> = backing
            .values()
            .map(|b| b.spelling)
            .filter(|v| *v != winner)
            .collect();
        messages.push(format!(
            "Conflicting {field} for '{label}': kept '{winner}' over '{}'",
            losers.join("', '")
        ));
    }

    Some(winner.to_string())
}

/// Union-find over candidate indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// The smaller index becomes the root, so roots are cluster minima.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }

    /// Components as ascending index lists, ordered by their smallest index.
    fn components(mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        by_root.into_values().collect()
    }
}
