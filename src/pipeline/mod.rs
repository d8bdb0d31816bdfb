pub mod classifier;
pub mod dedup;
pub mod orchestrator;
pub mod rate_limit;

pub use dedup::{DedupSweeper, Deduplicator};
pub use orchestrator::EventPipeline;
pub use rate_limit::RateLimiter;
