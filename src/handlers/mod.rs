//! HTTP handlers over the module orchestrator.

pub mod module;
