//! Runtime module — process lifecycle: boot and directory auto-load.

pub mod autoload;
pub mod boot;
