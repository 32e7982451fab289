//! Job module — job model, builder and in-memory store.

pub mod builder;
pub mod model;
pub mod store;

pub use builder::build;
pub use model::{Job, JobId, JobStatus, JobSummary, Stdout, StdoutFormat, StdoutLine};
pub use store::JobStore;
