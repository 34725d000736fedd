/// Pipeline stages and the progress checkpoint each one starts at.
/// Completion (100) is set by `Job::complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Initializing,
    RunningAgents,
    Aggregating,
    Deduplicating,
    Summarizing,
    Finalizing,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Initializing,
        Stage::RunningAgents,
        Stage::Aggregating,
        Stage::Deduplicating,
        Stage::Summarizing,
        Stage::Finalizing,
    ];

    pub fn progress(self) -> u8 {
        match self {
            Stage::Initializing => 10,
            Stage::RunningAgents => 25,
            Stage::Aggregating => 50,
            Stage::Deduplicating => 70,
            Stage::Summarizing => 85,
            Stage::Finalizing => 95,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing discovery agents",
            Stage::RunningAgents => "Running source agents",
            Stage::Aggregating => "Aggregating agent results",
            Stage::Deduplicating => "Deduplicating locations",
            Stage::Summarizing => "Computing summary statistics",
            Stage::Finalizing => "Finalizing report",
        }
    }
}
