//! Query fulfillment: intent routing, the per-subquery tool loop, result
//! aggregation and the engine that streams them as one event sequence.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod prompts;
pub mod router;
pub mod runner;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use aggregator::{AggregationMode, ResultAggregator};
pub use config::EngineConfig;
pub use engine::{QueryEngine, QueryHandle};
pub use router::IntentRouter;
pub use runner::Fulfiller;
