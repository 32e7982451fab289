//! State module — shared application state.

pub mod app;

pub use app::{AppState, SharedState};
