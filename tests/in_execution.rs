//! IN Planning and Execution Tests
//!
//! End-to-end checks that rewritten plans return exactly the records a
//! plain filtered scan returns, in the documented order:
//! - IN-joins emit values ascending, primary key order within a value
//! - OR-unions merge by their comparison key without duplicates
//! - Residual filters account for every discarded record

use std::collections::BTreeSet;
use std::sync::Arc;

use recordplan::executor::{
    EvaluationContext, ExecuteProperties, ExecutionResult, ExecutorErrorCode, QueryExecutor,
};
use recordplan::expr::{Comparison, Field, QueryPredicate};
use recordplan::index::{
    IndexColumn, IndexDefinition, MemoryRecordStore, RecordMetadata, RecordType,
};
use recordplan::plan::QueryPlan;
use recordplan::planner::{PlannerConfig, Query, QueryPlanner};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

/// Ten records: num = rec_no % 5, num3 = rec_no % 3, str alternates
/// even/odd, other = rec_no % 4, tags depend on rec_no % 3.
fn make_store() -> MemoryRecordStore {
    let metadata = RecordMetadata::new()
        .with_record_type(
            RecordType::new("MyRecord", "rec_no")
                .with_field("num")
                .with_field("num3")
                .with_field("str")
                .with_field("other")
                .with_repeated("tags"),
        )
        .with_index(IndexDefinition::value("by_num", "MyRecord", "num"))
        .with_index(IndexDefinition::value("by_str", "MyRecord", "str"))
        .with_index(IndexDefinition::compound("by_num3_str", "MyRecord", &["num3", "str"]))
        .with_index(IndexDefinition::fan_out("by_tag", "MyRecord", "tags"));
    let mut store = MemoryRecordStore::new(metadata);
    for rec_no in 0..10 {
        let tags = match rec_no % 3 {
            0 => json!(["x", "y"]),
            1 => json!(["y"]),
            _ => json!([]),
        };
        store
            .insert(
                "MyRecord",
                json!({
                    "rec_no": rec_no,
                    "num": rec_no % 5,
                    "num3": rec_no % 3,
                    "str": if rec_no % 2 == 0 { "even" } else { "odd" },
                    "other": rec_no % 4,
                    "tags": tags,
                }),
            )
            .unwrap();
    }
    store
}

fn make_plan(store: &MemoryRecordStore, query: Query, config: PlannerConfig) -> Arc<QueryPlan> {
    match QueryPlanner::new(store, config).plan(&query) {
        Ok(plan) => plan,
        Err(e) => panic!("planning failed: {}", e),
    }
}

fn run(store: &MemoryRecordStore, plan: &QueryPlan, ctx: &EvaluationContext) -> ExecutionResult {
    QueryExecutor::new(store)
        .execute(plan, ctx, &ExecuteProperties::new())
        .unwrap()
}

fn rec_nos(result: &ExecutionResult) -> Vec<i64> {
    result
        .iter()
        .map(|r| r.field("rec_no").and_then(Value::as_i64).unwrap())
        .collect()
}

/// Records a full scan filtered by `filter` returns, as a set
fn expected_set(
    store: &MemoryRecordStore,
    filter: Arc<QueryPredicate>,
    ctx: &EvaluationContext,
) -> BTreeSet<i64> {
    let plan = QueryPlan::filter(Arc::new(QueryPlan::scan("MyRecord")), vec![filter]);
    rec_nos(&run(store, &plan, ctx)).into_iter().collect()
}

/// Records tagged by a compound index whose second column fans out; record 2
/// has no tags at all.
fn make_tagged_store() -> MemoryRecordStore {
    let metadata = RecordMetadata::new()
        .with_record_type(
            RecordType::new("Tagged", "id")
                .with_field("num")
                .with_repeated("tags"),
        )
        .with_index(IndexDefinition::with_columns(
            "by_num_tags",
            "Tagged",
            vec![IndexColumn::value("num"), IndexColumn::fan_out("tags")],
        ));
    let mut store = MemoryRecordStore::new(metadata);
    for body in [
        json!({"id": 1, "num": 1, "tags": ["a", "b"]}),
        json!({"id": 2, "num": 1, "tags": []}),
        json!({"id": 3, "num": 2, "tags": ["a"]}),
        json!({"id": 4, "num": 1, "tags": ["b", "a"]}),
    ] {
        store.insert("Tagged", body).unwrap();
    }
    store
}

fn ids(result: &ExecutionResult) -> Vec<i64> {
    result
        .iter()
        .map(|r| r.field("id").and_then(Value::as_i64).unwrap())
        .collect()
}

fn nums(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| json!(v)).collect()
}

// =============================================================================
// IN-Join Tests
// =============================================================================

/// Literal IN over an indexed field runs as a join in value order.
#[test]
fn test_in_join_value_order() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let filter = Field::new("num").in_list(nums(&[1, 2, 4]));
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter.clone()),
        PlannerConfig::default(),
    );
    assert!(plan.has_in_join());

    let result = run(&store, &plan, &ctx);
    assert_eq!(rec_nos(&result), vec![1, 6, 2, 7, 4, 9]);
    assert_eq!(result.discarded_count, 0);
    assert_eq!(result.scanned_count, 6);
    assert_eq!(
        rec_nos(&result).into_iter().collect::<BTreeSet<_>>(),
        expected_set(&store, filter, &ctx)
    );
}

/// An unsorted literal list with a sort on the IN field still returns
/// records ordered by that field.
#[test]
fn test_in_join_satisfies_sort() {
    let store = make_store();
    let query = Query::new("MyRecord")
        .with_filter(Field::new("num").in_list(nums(&[1, 4, 2])))
        .with_sort(["num"]);
    let plan = make_plan(&store, query, PlannerConfig::default());
    let result = run(&store, &plan, &EvaluationContext::new());
    assert_eq!(rec_nos(&result), vec![1, 6, 2, 7, 4, 9]);
}

/// An empty literal list returns no records.
#[test]
fn test_empty_list_returns_nothing() {
    let store = make_store();
    let query = Query::new("MyRecord").with_filter(Field::new("num").in_list(vec![]));
    let plan = make_plan(&store, query, PlannerConfig::default());
    let result = run(&store, &plan, &EvaluationContext::new());
    assert!(result.is_empty());
    assert_eq!(result.scanned_count, 0);
    assert!(result.continuation.is_none());
}

/// Parameter lists are sorted before joining.
#[test]
fn test_parameter_list_sorted_at_execution() {
    let store = make_store();
    let query = Query::new("MyRecord").with_filter(Field::new("num").in_parameter("nums"));
    let plan = make_plan(&store, query, PlannerConfig::default());
    let ctx = EvaluationContext::new().with_parameter("nums", json!([4, 1, 4]));
    assert_eq!(rec_nos(&run(&store, &plan, &ctx)), vec![1, 6, 4, 9]);
}

/// Missing, null and empty parameter bindings.
#[test]
fn test_parameter_bindings() {
    let store = make_store();
    let query = Query::new("MyRecord").with_filter(Field::new("num").in_parameter("nums"));
    let plan = make_plan(&store, query, PlannerConfig::default());
    let executor = QueryExecutor::new(&store);

    let err = executor
        .execute(&plan, &EvaluationContext::new(), &ExecuteProperties::new())
        .unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::ExecMissingBinding);
    assert!(err.is_data_error());

    let null = EvaluationContext::new().with_parameter("nums", Value::Null);
    assert!(run(&store, &plan, &null).is_empty());

    let empty = EvaluationContext::new().with_parameter("nums", json!([]));
    assert!(run(&store, &plan, &empty).is_empty());

    let scalar = EvaluationContext::new().with_parameter("nums", json!(3));
    let err = executor
        .execute(&plan, &scalar, &ExecuteProperties::new())
        .unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::ExecMalformedValue);
}

/// Two IN predicates on a compound index nest, outer join first.
#[test]
fn test_nested_in_joins() {
    let store = make_store();
    let filter = QueryPredicate::and(vec![
        Field::new("num3").in_list(nums(&[2, 0])),
        Field::new("str").in_list(vec![json!("odd"), json!("even")]),
    ]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter),
        PlannerConfig::default(),
    );
    let result = run(&store, &plan, &EvaluationContext::new());
    assert_eq!(rec_nos(&result), vec![0, 6, 3, 9, 2, 8, 5]);
    assert_eq!(result.discarded_count, 0);
}

/// IN over a fan-out index returns each record once.
#[test]
fn test_fan_out_in_is_distinct() {
    let store = make_store();
    let filter = Field::new("tags").one_of_them(Comparison::in_list(vec![json!("y"), json!("x")]));
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter.clone()),
        PlannerConfig::default(),
    );
    let ctx = EvaluationContext::new();
    let result = run(&store, &plan, &ctx);
    assert_eq!(rec_nos(&result), vec![0, 3, 6, 9, 1, 4, 7]);
    assert_eq!(
        rec_nos(&result).into_iter().collect::<BTreeSet<_>>(),
        expected_set(&store, filter, &ctx)
    );
}

// =============================================================================
// Filter Fallback Tests
// =============================================================================

/// IN on an unindexed field is a residual filter over a scan.
#[test]
fn test_unindexed_in_discards() {
    let store = make_store();
    let query = Query::new("MyRecord").with_filter(Field::new("other").in_list(nums(&[2, 0])));
    let plan = make_plan(&store, query, PlannerConfig::default());
    assert!(!plan.has_in_join());
    let result = run(&store, &plan, &EvaluationContext::new());
    assert_eq!(rec_nos(&result), vec![0, 2, 4, 6, 8]);
    assert_eq!(result.scanned_count, 10);
    assert_eq!(result.discarded_count, 5);
}

/// The OR rewrite returns the fallback's records while fetching fewer.
#[test]
fn test_in_as_or_matches_fallback() {
    let store = make_store();
    let query = Query::new("MyRecord")
        .with_filter(Field::new("num3").in_list(nums(&[4, 1])))
        .with_sort(["str"]);
    let ctx = EvaluationContext::new();

    let fallback = make_plan(&store, query.clone(), PlannerConfig::default());
    let fallback_result = run(&store, &fallback, &ctx);
    assert_eq!(rec_nos(&fallback_result), vec![4, 1, 7]);
    assert_eq!(fallback_result.discarded_count, 7);

    let union = make_plan(&store, query, PlannerConfig::default().with_in_as_or(true));
    assert!(matches!(union.as_ref(), QueryPlan::Union { .. }));
    let union_result = run(&store, &union, &ctx);
    assert_eq!(rec_nos(&union_result), vec![4, 1, 7]);
    assert_eq!(union_result.discarded_count, 0);
    assert_eq!(union_result.scanned_count, 3);
}

// =============================================================================
// Disjunction Tests
// =============================================================================

/// Branches sharing an order merge by primary key without duplicates.
#[test]
fn test_ordered_union_execution() {
    let store = make_store();
    let filter = QueryPredicate::or(vec![
        Field::new("num").equals(json!(1)),
        Field::new("str").equals(json!("even")),
    ]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter.clone()),
        PlannerConfig::default(),
    );
    assert_eq!(
        plan.to_string(),
        "Union[rec_no](Index(by_num [EQUALS 1]), Index(by_str [EQUALS \"even\"]))"
    );
    let ctx = EvaluationContext::new();
    let result = run(&store, &plan, &ctx);
    assert_eq!(rec_nos(&result), vec![0, 1, 2, 4, 6, 8]);
    assert_eq!(
        rec_nos(&result).into_iter().collect::<BTreeSet<_>>(),
        expected_set(&store, filter, &ctx)
    );
}

/// An IN branch makes the union unordered; distinct removes overlap.
#[test]
fn test_unordered_union_execution() {
    let store = make_store();
    let filter = QueryPredicate::or(vec![
        Field::new("num").in_list(nums(&[2, 1])),
        Field::new("str").equals(json!("even")),
    ]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter),
        PlannerConfig::default(),
    );
    let result = run(&store, &plan, &EvaluationContext::new());
    assert_eq!(rec_nos(&result), vec![1, 6, 2, 7, 0, 4, 8]);
}

// =============================================================================
// Fan-Out Index Tests
// =============================================================================

/// An equality on the leading column alone does not scan the fan-out index:
/// that would repeat multi-tag records and skip untagged ones.
#[test]
fn test_fan_out_index_unused_without_one_of_them() {
    let store = make_tagged_store();
    let query = Query::new("Tagged").with_filter(Field::new("num").equals(json!(1)));
    let plan = make_plan(&store, query, PlannerConfig::default());
    assert!(!plan.to_string().contains("by_num_tags"));

    let result = run(&store, &plan, &EvaluationContext::new());
    assert_eq!(ids(&result), vec![1, 2, 4]);
}

/// A one-of-them join over the fan-out column returns each record once.
#[test]
fn test_fan_out_join_after_prefix_is_distinct() {
    let store = make_tagged_store();
    let filter = QueryPredicate::and(vec![
        Field::new("num").equals(json!(1)),
        Field::new("tags").one_of_them(Comparison::in_list(vec![json!("b"), json!("a")])),
    ]);
    let plan = make_plan(
        &store,
        Query::new("Tagged").with_filter(filter.clone()),
        PlannerConfig::default(),
    );
    assert!(plan.has_in_join());
    assert!(plan.to_string().ends_with("PrimaryKeyDistinct"));

    let ctx = EvaluationContext::new();
    let result = run(&store, &plan, &ctx);
    assert_eq!(ids(&result), vec![1, 4]);

    let scan = QueryPlan::filter(Arc::new(QueryPlan::scan("Tagged")), vec![filter]);
    assert_eq!(ids(&run(&store, &scan, &ctx)), vec![1, 4]);
}

// =============================================================================
// Numeric Key Tests
// =============================================================================

/// A float bound on an integer column compares by numeric value.
#[test]
fn test_float_range_over_int_index() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let filter = Field::new("num").greater_than(json!(3.5));
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter.clone()),
        PlannerConfig::default(),
    );
    assert!(plan.to_string().starts_with("Index(by_num"));

    let result = run(&store, &plan, &ctx);
    assert_eq!(rec_nos(&result), vec![4, 9]);
    assert_eq!(
        rec_nos(&result).into_iter().collect::<BTreeSet<_>>(),
        expected_set(&store, filter, &ctx)
    );
}

/// Integral floats in an IN list find integer keys.
#[test]
fn test_float_in_list_over_int_index() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let filter = Field::new("num").in_list(vec![json!(2.0), json!(1.0)]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter.clone()),
        PlannerConfig::default(),
    );
    assert!(plan.has_in_join());

    let result = run(&store, &plan, &ctx);
    assert_eq!(rec_nos(&result), vec![1, 6, 2, 7]);
    assert_eq!(
        rec_nos(&result).into_iter().collect::<BTreeSet<_>>(),
        expected_set(&store, filter, &ctx)
    );
}
