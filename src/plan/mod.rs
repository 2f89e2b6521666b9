// src/plan/mod.rs

//! Execution planning: expansion of requested jobs into a dependency-ordered
//! plan, with unknown-reference and cycle detection.

pub mod graph;

pub use graph::ExecutionPlan;
