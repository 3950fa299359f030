//! Lane Alternates: exact-quota alternate city pairs for freight lanes.
//!
//! A lane (origin city to destination city) is expanded into its base pair
//! plus exactly `K` alternate pairs drawn from nearby freight markets, and
//! every pair is posted once per contact method.

pub mod candidates;
pub mod config;
pub mod directory;
pub mod engine;
pub mod geo;
pub mod normalize;
pub mod posting;
pub mod selector;
pub mod server;
pub mod types;
pub mod verify;

pub use config::EngineConfig;
pub use directory::{CityDirectory, InMemoryDirectory};
pub use engine::{BatchReport, BatchResult, LaneEngine, LaneOutcome};
pub use types::{CandidatePair, City, Lane, LaneError, LaneInput, PairKind, PairSequence};
