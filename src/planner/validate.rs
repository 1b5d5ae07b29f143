//! Static query validation
//!
//! Field references and operand shapes are checked against the record type
//! before any candidate plan is built. A query that fails here never reaches
//! execution.

use std::collections::HashSet;

use crate::expr::{Comparison, ComparisonType, Operand, QueryPredicate, Value};
use crate::index::RecordType;

use super::errors::{PlannerError, PlannerResult};
use super::query::Query;

/// Validates queries over one record type
pub struct QueryValidator<'a> {
    record_type: &'a RecordType,
}

impl<'a> QueryValidator<'a> {
    pub fn new(record_type: &'a RecordType) -> Self {
        Self { record_type }
    }

    /// Validates the filter and the sort of a query
    pub fn validate(&self, query: &Query) -> PlannerResult<()> {
        if let Some(filter) = &query.filter {
            self.check_predicate(filter)?;
        }
        self.check_sort(&query.sort)
    }

    fn check_predicate(&self, predicate: &QueryPredicate) -> PlannerResult<()> {
        match predicate {
            QueryPredicate::Value(p) => {
                let label = match p.value.as_ref() {
                    Value::Field(path) => {
                        self.check_field(path)?;
                        if self.record_type.is_repeated(path)
                            && !matches!(
                                p.comparison.op,
                                ComparisonType::IsNull | ComparisonType::NotNull
                            )
                        {
                            return Err(PlannerError::type_mismatch(
                                path.clone(),
                                "repeated field needs a one-of-them comparison",
                            ));
                        }
                        path.clone()
                    }
                    other => other.to_string(),
                };
                check_operand(&label, &p.comparison)
            }
            QueryPredicate::And(children) | QueryPredicate::Or(children) => {
                if children.is_empty() {
                    return Err(PlannerError::invalid_query(format!(
                        "empty connective in '{}'",
                        predicate
                    )));
                }
                children.iter().try_for_each(|c| self.check_predicate(c))
            }
            QueryPredicate::Not(child) => self.check_predicate(child),
            QueryPredicate::OneOfThem(p) => {
                self.check_field(&p.field)?;
                if !self.record_type.is_repeated(&p.field) {
                    return Err(PlannerError::type_mismatch(
                        p.field.clone(),
                        "one-of-them needs a repeated field",
                    ));
                }
                check_operand(&p.field, &p.comparison)
            }
        }
    }

    fn check_field(&self, path: &str) -> PlannerResult<()> {
        if self.record_type.declares(path) {
            Ok(())
        } else {
            Err(PlannerError::invalid_field(&self.record_type.name, path))
        }
    }

    fn check_sort(&self, sort: &[String]) -> PlannerResult<()> {
        let mut seen = HashSet::new();
        for field in sort {
            self.check_field(field)?;
            if self.record_type.is_repeated(field) {
                return Err(PlannerError::type_mismatch(
                    field.clone(),
                    "cannot sort by a repeated field",
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(PlannerError::invalid_query(format!(
                    "sort names '{}' twice",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Operand shape must fit the operator
fn check_operand(field: &str, comparison: &Comparison) -> PlannerResult<()> {
    let fits = match (comparison.op, &comparison.operand) {
        (ComparisonType::IsNull | ComparisonType::NotNull, operand) => {
            matches!(operand, Operand::None)
        }
        (ComparisonType::In, operand) => matches!(
            operand,
            Operand::LiteralList(_) | Operand::Parameter(_) | Operand::Correlation(_)
        ),
        (_, Operand::Literal(value)) => !value.is_array() && !value.is_object(),
        (_, operand) => matches!(operand, Operand::Parameter(_) | Operand::Correlation(_)),
    };
    if fits {
        Ok(())
    } else {
        Err(PlannerError::type_mismatch(
            field,
            format!("operand does not fit '{}'", comparison),
        ))
    }
}
