//! Explain output
//!
//! Every plan renders as one deterministic line.

use std::fmt;

use crate::expr::format_list;

use super::node::{InSource, QueryPlan};

impl fmt::Display for InSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InSource::Values(values) => write!(f, "{}", format_list(values)),
            InSource::Parameter(name) => write!(f, "${}", name),
        }
    }
}

fn join_children(children: &[std::sync::Arc<QueryPlan>]) -> String {
    let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
    parts.join(", ")
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::Scan { .. } => write!(f, "Scan(<,>)"),
            QueryPlan::IndexScan { index, comparisons } => {
                if comparisons.is_empty() {
                    return write!(f, "Index({} <,>)", index);
                }
                let parts: Vec<String> = comparisons
                    .equality
                    .iter()
                    .chain(comparisons.inequality.iter())
                    .map(|c| c.to_string())
                    .collect();
                write!(f, "Index({} [{}])", index, parts.join(", "))
            }
            QueryPlan::Filter { child, predicates } => {
                let parts: Vec<String> = predicates.iter().map(|p| p.to_string()).collect();
                write!(f, "{} | {}", child, parts.join(" AND "))
            }
            QueryPlan::InJoin {
                child,
                binding,
                source,
            } => write!(f, "{} WHERE {} IN {}", child, binding, source),
            QueryPlan::Union {
                children,
                comparison_key,
            } => write!(
                f,
                "Union[{}]({})",
                comparison_key.join(", "),
                join_children(children)
            ),
            QueryPlan::UnorderedUnion { children } => {
                write!(f, "UnorderedUnion({})", join_children(children))
            }
            QueryPlan::PrimaryKeyDistinct { child } => write!(f, "{} | PrimaryKeyDistinct", child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Comparison, CorrelationIdentifier, Field};
    use crate::plan::ScanComparisons;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_explain_filter_over_scan() {
        let plan = QueryPlan::filter(
            Arc::new(QueryPlan::scan("MyRecord")),
            vec![Field::new("num").in_list(vec![json!(0), json!(2)])],
        );
        assert_eq!(plan.to_string(), "Scan(<,>) | num IN [0, 2]");
    }

    #[test]
    fn test_explain_in_join() {
        let id = CorrelationIdentifier::in_binding("num", 0);
        let scan = QueryPlan::index_scan(
            "by_num",
            ScanComparisons {
                equality: vec![Comparison::equals_correlation(id.clone())],
                inequality: vec![],
            },
        );
        let plan = QueryPlan::in_join(
            Arc::new(scan),
            id,
            InSource::Values(vec![json!(1), json!(2), json!(4)]),
        );
        assert_eq!(
            plan.to_string(),
            "Index(by_num [EQUALS $__in_num__0]) WHERE __in_num__0 IN [1, 2, 4]"
        );
    }

    #[test]
    fn test_explain_unions() {
        let a = Arc::new(QueryPlan::index_scan("a", ScanComparisons::default()));
        let b = Arc::new(QueryPlan::scan("MyRecord"));
        let ordered = QueryPlan::union(
            vec![a.clone(), b.clone()],
            vec!["str".into(), "rec_no".into()],
        );
        assert_eq!(ordered.to_string(), "Union[str, rec_no](Index(a <,>), Scan(<,>))");

        let unordered = QueryPlan::distinct(Arc::new(QueryPlan::unordered_union(vec![a, b])));
        assert_eq!(
            unordered.to_string(),
            "UnorderedUnion(Index(a <,>), Scan(<,>)) | PrimaryKeyDistinct"
        );
    }
}
