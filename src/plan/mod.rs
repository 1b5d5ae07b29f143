//! Physical plans
//!
//! Plan trees are immutable and share sub-plans through `Arc`. Each plan
//! renders a one-line explain string and hashes under three `PlanHashKind`s.

mod explain;
mod hash;
mod node;
mod ordering;

pub use hash::{PlanHashKind, PlanHashable};
pub use node::{InSource, QueryPlan, ScanComparisons};
pub use ordering::PlanOrdering;
