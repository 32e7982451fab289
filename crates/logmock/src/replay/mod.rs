//! Replay module — streams cataloged sources to sinks.
//!
//! `resolve.rs` maps a selector to an ordered source list, `pacing.rs`
//! computes inter-line delays and `engine.rs` owns the single session.

pub mod engine;
pub mod error;
pub mod model;
pub mod pacing;
pub mod resolve;

pub use engine::{EngineSettings, ReplayEngine};
pub use error::ReplayError;
pub use model::{Cursor, ReplayConfig, ReplayState, ReplayStatus, SessionId, SinkCounts, SinkMode};
pub use resolve::{ReplaySource, SELECT_ALL, SELECT_LATEST};
