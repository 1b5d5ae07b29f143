//! Continuation Tests
//!
//! Paging with a limit and resuming from each continuation must return the
//! exact records of one unlimited run:
//! - no record repeated, none skipped, same order
//! - tokens from incompatible plans are rejected
//! - tokens survive a change of IN list values

use std::sync::Arc;

use recordplan::executor::{
    Continuation, CursorPosition, EvaluationContext, ExecuteProperties, ExecutionResult,
    ExecutorErrorCode, QueryExecutor,
};
use recordplan::expr::{Comparison, Field, QueryPredicate};
use recordplan::index::{IndexDefinition, MemoryRecordStore, RecordMetadata, RecordType};
use recordplan::plan::QueryPlan;
use recordplan::planner::{PlannerConfig, Query, QueryPlanner};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_store() -> MemoryRecordStore {
    let metadata = RecordMetadata::new()
        .with_record_type(
            RecordType::new("MyRecord", "rec_no")
                .with_field("num")
                .with_field("num3")
                .with_field("str")
                .with_repeated("tags"),
        )
        .with_index(IndexDefinition::value("by_num", "MyRecord", "num"))
        .with_index(IndexDefinition::value("by_str", "MyRecord", "str"))
        .with_index(IndexDefinition::compound("by_num3_str", "MyRecord", &["num3", "str"]))
        .with_index(IndexDefinition::fan_out("by_tag", "MyRecord", "tags"));
    let mut store = MemoryRecordStore::new(metadata);
    for rec_no in 0..20 {
        let tags = if rec_no % 2 == 0 {
            json!(["x", "y"])
        } else {
            json!(["y"])
        };
        store
            .insert(
                "MyRecord",
                json!({
                    "rec_no": rec_no,
                    "num": rec_no % 5,
                    "num3": rec_no % 3,
                    "str": if rec_no % 2 == 0 { "even" } else { "odd" },
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

fn rec_nos(result: &ExecutionResult) -> Vec<i64> {
    result
        .iter()
        .map(|r| r.field("rec_no").and_then(Value::as_i64).unwrap())
        .collect()
}

/// Runs `plan` in pages of `limit`, following continuations to the end.
fn paged(
    store: &MemoryRecordStore,
    plan: &QueryPlan,
    ctx: &EvaluationContext,
    limit: usize,
) -> Vec<i64> {
    let executor = QueryExecutor::new(store);
    let mut out = Vec::new();
    let mut continuation = None;
    for _ in 0..100 {
        let mut props = ExecuteProperties::new().with_limit(limit);
        if let Some(token) = continuation.take() {
            props = props.with_continuation(token);
        }
        let page = executor.execute(plan, ctx, &props).unwrap();
        assert!(page.len() <= limit);
        out.extend(rec_nos(&page));
        match page.continuation {
            Some(token) => continuation = Some(token),
            None => return out,
        }
    }
    panic!("pagination did not terminate");
}

fn unlimited(store: &MemoryRecordStore, plan: &QueryPlan, ctx: &EvaluationContext) -> Vec<i64> {
    let result = QueryExecutor::new(store)
        .execute(plan, ctx, &ExecuteProperties::new())
        .unwrap();
    assert!(result.continuation.is_none());
    rec_nos(&result)
}

fn assert_paging_matches(store: &MemoryRecordStore, plan: &QueryPlan, ctx: &EvaluationContext) {
    let expected = unlimited(store, plan, ctx);
    assert!(!expected.is_empty());
    for limit in 1..=4 {
        assert_eq!(paged(store, plan, ctx, limit), expected, "limit {}", limit);
    }
}

// =============================================================================
// Resumption Tests
// =============================================================================

#[test]
fn test_in_join_pages() {
    let store = make_store();
    let query = Query::new("MyRecord").with_filter(Field::new("num").in_list(vec![
        json!(4),
        json!(0),
        json!(2),
    ]));
    let plan = make_plan(&store, query, PlannerConfig::default());
    assert!(plan.has_in_join());
    assert_paging_matches(&store, &plan, &EvaluationContext::new());
}

#[test]
fn test_parameter_in_join_pages() {
    let store = make_store();
    let query = Query::new("MyRecord").with_filter(Field::new("num").in_parameter("nums"));
    let plan = make_plan(&store, query, PlannerConfig::default());
    let ctx = EvaluationContext::new().with_parameter("nums", json!([3, 1]));
    assert_paging_matches(&store, &plan, &ctx);
}

#[test]
fn test_nested_in_join_pages() {
    let store = make_store();
    let filter = QueryPredicate::and(vec![
        Field::new("num3").in_list(vec![json!(0), json!(2)]),
        Field::new("str").in_list(vec![json!("even"), json!("odd")]),
    ]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter),
        PlannerConfig::default(),
    );
    assert_paging_matches(&store, &plan, &EvaluationContext::new());
}

#[test]
fn test_ordered_union_pages() {
    let store = make_store();
    let filter = QueryPredicate::or(vec![
        Field::new("num").equals(json!(1)),
        Field::new("str").equals(json!("even")),
    ]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter),
        PlannerConfig::default(),
    );
    assert!(matches!(plan.as_ref(), QueryPlan::Union { .. }));
    assert_paging_matches(&store, &plan, &EvaluationContext::new());
}

#[test]
fn test_in_as_or_union_pages() {
    let store = make_store();
    let query = Query::new("MyRecord")
        .with_filter(Field::new("num3").in_list(vec![json!(2), json!(1)]))
        .with_sort(["str"]);
    let plan = make_plan(&store, query, PlannerConfig::default().with_in_as_or(true));
    assert!(matches!(plan.as_ref(), QueryPlan::Union { .. }));
    assert_paging_matches(&store, &plan, &EvaluationContext::new());
}

#[test]
fn test_unordered_union_pages() {
    let store = make_store();
    let filter = QueryPredicate::or(vec![
        Field::new("num").in_list(vec![json!(1), json!(2)]),
        Field::new("str").equals(json!("even")),
    ]);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter),
        PlannerConfig::default(),
    );
    assert!(matches!(plan.as_ref(), QueryPlan::PrimaryKeyDistinct { .. }));
    assert_paging_matches(&store, &plan, &EvaluationContext::new());
}

#[test]
fn test_fan_out_distinct_pages() {
    let store = make_store();
    let filter = Field::new("tags").one_of_them(Comparison::in_list(vec![json!("x"), json!("y")]));
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(filter),
        PlannerConfig::default(),
    );
    let ctx = EvaluationContext::new();
    assert_paging_matches(&store, &plan, &ctx);
    assert_eq!(unlimited(&store, &plan, &ctx).len(), 20);
}

#[test]
fn test_filter_fallback_pages() {
    let store = make_store();
    let query = Query::new("MyRecord")
        .with_filter(Field::new("num3").in_list(vec![json!(2), json!(1)]))
        .with_sort(["str"]);
    let plan = make_plan(&store, query, PlannerConfig::default());
    assert!(!plan.has_in_join());
    assert_paging_matches(&store, &plan, &EvaluationContext::new());
}

// =============================================================================
// Compatibility Tests
// =============================================================================

/// A token from another plan shape is rejected, not misapplied.
#[test]
fn test_mismatched_plan_rejected() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let executor = QueryExecutor::new(&store);

    let join = make_plan(
        &store,
        Query::new("MyRecord").with_filter(Field::new("num").in_list(vec![json!(1), json!(2)])),
        PlannerConfig::default(),
    );
    let token = executor
        .execute(&join, &ctx, &ExecuteProperties::new().with_limit(1))
        .unwrap()
        .continuation
        .unwrap();

    let scan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(Field::new("num3").equals(json!(1))),
        PlannerConfig::default(),
    );
    let err = executor
        .execute(&scan, &ctx, &ExecuteProperties::new().with_continuation(token))
        .unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::ExecContinuationMismatch);
    assert!(err.is_continuation_error());
}

/// Replanning the same query yields a plan that accepts the old token.
#[test]
fn test_replanned_query_accepts_token() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let executor = QueryExecutor::new(&store);
    let query = Query::new("MyRecord")
        .with_filter(Field::new("num").in_list(vec![json!(1), json!(2)]));

    let first_plan = make_plan(&store, query.clone(), PlannerConfig::default());
    let first = executor
        .execute(&first_plan, &ctx, &ExecuteProperties::new().with_limit(3))
        .unwrap();

    let second_plan = make_plan(&store, query, PlannerConfig::default());
    let token = first.continuation.clone().unwrap();
    let rest = executor
        .execute(&second_plan, &ctx, &ExecuteProperties::new().with_continuation(token))
        .unwrap();

    let mut all = rec_nos(&first);
    all.extend(rec_nos(&rest));
    assert_eq!(all, unlimited(&store, &first_plan, &ctx));
}

/// Changing only the IN values keeps the token valid; it resumes at the
/// first value not below the recorded one.
#[test]
fn test_token_survives_changed_in_values() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let executor = QueryExecutor::new(&store);

    let before = make_plan(
        &store,
        Query::new("MyRecord").with_filter(Field::new("num").in_list(vec![json!(1), json!(2)])),
        PlannerConfig::default(),
    );
    // num = 1 holds rec 1, 6, 11, 16; stop inside that run
    let first = executor
        .execute(&before, &ctx, &ExecuteProperties::new().with_limit(2))
        .unwrap();
    assert_eq!(rec_nos(&first), vec![1, 6]);

    let after = make_plan(
        &store,
        Query::new("MyRecord").with_filter(Field::new("num").in_list(vec![json!(1), json!(3)])),
        PlannerConfig::default(),
    );
    let token = first.continuation.unwrap();
    let rest = executor
        .execute(&after, &ctx, &ExecuteProperties::new().with_continuation(token))
        .unwrap();
    assert_eq!(rec_nos(&rest), vec![11, 16, 3, 8, 13, 18]);
}

/// Corrupted bytes are a malformed continuation.
#[test]
fn test_corrupted_token_rejected() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let executor = QueryExecutor::new(&store);
    let plan = QueryPlan::scan("MyRecord");

    let mut token = executor
        .execute(&plan, &ctx, &ExecuteProperties::new().with_limit(1))
        .unwrap()
        .continuation
        .unwrap();
    let last = token.len() - 1;
    token[last] ^= 0x01;

    let err = executor
        .execute(&plan, &ctx, &ExecuteProperties::new().with_continuation(token))
        .unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::ExecMalformedContinuation);
}

/// IN-join tokens record the current value next to its index.
#[test]
fn test_in_join_token_records_value() {
    let store = make_store();
    let ctx = EvaluationContext::new();
    let executor = QueryExecutor::new(&store);
    let plan = make_plan(
        &store,
        Query::new("MyRecord").with_filter(Field::new("num").in_list(vec![json!(2), json!(4)])),
        PlannerConfig::default(),
    );
    let token = executor
        .execute(&plan, &ctx, &ExecuteProperties::new().with_limit(5))
        .unwrap()
        .continuation
        .unwrap();
    let decoded = Continuation::from_bytes(&token).unwrap();
    match decoded.position {
        CursorPosition::InJoin { index, value, .. } => {
            assert_eq!(index, 1);
            assert_eq!(value, json!(4));
        }
        other => panic!("unexpected position {:?}", other),
    }
}
