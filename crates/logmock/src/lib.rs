// Module structure for the logmock service.

// Core infrastructure
pub mod conf;
pub mod state;
pub mod runtime;

// Ingestion
pub mod parser;
pub mod source;
pub mod job;
pub mod ingest;

// Replay
pub mod replay;
pub mod sink;
