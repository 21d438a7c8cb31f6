//! # Time Math MCP Server Core
//!
//! Batch time-arithmetic engine behind the MCP server: calendar-aware
//! duration application, differences and breakdowns, timestamp statistics
//! and chronological sorting over one or many timestamps per input slot.
//!
//! ## Pipeline
//! Raw arguments flow strictly downward: normalizer -> planner -> resolver
//! (per element) -> executors via the batch runner -> response assembler.
//!
//! ## Modules
//! - `error`: Custom error types and error handling
//! - `models`: Data structures for requests and responses
//! - `normalize`: Single-or-array input coercion and "now" defaulting
//! - `plan`: Interaction modes, cardinality rules and the operation ceiling
//! - `timepoint`: Timestamp resolution into instant-plus-zone values
//! - `ops`: The pure arithmetic executors
//! - `provider`: The engine entry point and batch runner
//! - `utils`: Format constants and unit helpers

pub mod error;
pub mod models;
pub mod normalize;
pub mod ops;
pub mod plan;
pub mod provider;
pub mod timepoint;
pub mod utils;
