pub mod config;
pub mod error;
pub mod job;
pub mod types;
pub mod url_clean;

pub use config::Config;
pub use error::LocusError;
pub use job::{Job, JobId, JobStatus};
pub use types::*;
pub use url_clean::clean_url;
