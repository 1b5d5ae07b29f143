//! Expression and predicate model
//!
//! Values, comparisons and predicates are immutable and shared through `Arc`.
//!
//! # Invariants
//!
//! - `semantic_equals` ignores correlation names up to an `AliasMap`
//! - `semantic_hash_code` never reads correlation names
//! - `rebase` returns the same `Arc` when the map renames nothing
//! - Evaluation is three-valued; absent data is unknown, not an error

mod comparison;
mod context;
mod correlation;
mod errors;
pub(crate) mod hashing;
mod predicate;
mod value;

pub use comparison::{format_list, Comparison, ComparisonType, Operand};
pub use context::EvaluationContext;
pub use correlation::{AliasMap, CorrelationIdentifier};
pub use errors::{EvalError, EvalResult};
pub use predicate::{Field, OneOfThemPredicate, QueryPredicate, ValuePredicate};
pub use value::{field_path_value, Value};
