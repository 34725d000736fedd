pub mod backends;
pub mod embedder;
pub mod extractor;
pub mod fetcher;
pub mod places;
pub mod searcher;
pub mod util;

pub use backends::LiveBackends;
