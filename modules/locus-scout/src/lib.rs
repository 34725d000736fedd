pub mod admission;
pub mod agents;
pub mod infra;
pub mod jobs;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
