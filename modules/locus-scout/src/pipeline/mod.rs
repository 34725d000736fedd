pub mod aggregator;
pub mod dedup;

pub use aggregator::{aggregate, Aggregation, Candidate};
pub use dedup::{
    CorroborationPolicy, DedupOutcome, DedupSettings, Deduplicator, SIMILARITY_THRESHOLD,
};
