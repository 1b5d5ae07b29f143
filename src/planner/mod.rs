//! Query planner
//!
//! Turns a `Query` into a physical `QueryPlan`, rewriting IN predicates into
//! IN-joins, ordered unions of equality branches, or residual filters.
//!
//! # Design Principles
//!
//! - Deterministic: same query, catalog and configuration, same plan
//! - Sort-preserving: a plan is only chosen if it yields the requested order
//! - Semantics-preserving: no rewrite changes which records qualify
//! - Fail fast: structural mistakes are rejected before any execution
//!
//! # Strategy Preference
//!
//! 1. Most index columns constrained
//! 2. IN-join before union before plain scans
//! 3. Index name

mod catalog;
mod config;
mod errors;
mod planner;
mod query;
mod rules;
mod validate;

pub use catalog::IndexCatalog;
pub use config::{PlannerConfig, DEFAULT_MAX_IN_AS_OR_BRANCHES};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use planner::QueryPlanner;
pub use query::Query;
pub use validate::QueryValidator;
