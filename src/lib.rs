//! recordplan - index-aware query planning for a record layer
//!
//! Turns predicate trees over records into executable, resumable plans:
//!
//! - `expr`: values, comparisons and predicates with correlation identifiers
//! - `matcher`: binding matchers, planner bindings and memo groups
//! - `plan`: physical plan nodes, plan hashing and explain output
//! - `planner`: the IN-predicate rewrite planner
//! - `executor`: continuation-capable cursors over plans
//! - `index`: ordered index keys and an in-memory record store

mod observability;

pub mod executor;
pub mod expr;
pub mod index;
pub mod matcher;
pub mod plan;
pub mod planner;
