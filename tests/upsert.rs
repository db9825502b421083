mod support;

use std::collections::HashMap;
use std::sync::Arc;

use graph_upsert::{
    BufferLogger, CancelToken, Client, CounterProgress, Duple, DupleNode, FailurePolicy,
    InMemoryGraph, Operation, ProgressUpdate, QueryError, StoreError, Uid, UidCache,
    UpsertConfig, UpsertError,
};
use support::{
    cancel_on_commit, people, person, ContendedGraph, ForgetfulGraph, ReadOnlyGraph,
};

#[test]
fn repeats_of_a_cached_identifier_never_reach_the_store() {
    let graph = InMemoryGraph::new();
    let existing = graph.seed(&person("alice")).unwrap();
    graph.reset_stats();

    let mut seeded = HashMap::new();
    seeded.insert("alice".to_string(), existing.clone());

    let report = Client::new()
        .with_workers(1)
        .batch(&graph)
        .with_cache(UidCache::from(seeded))
        .run(vec![person("alice"), person("alice"), person("bob")])
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.processed(), 3);
    assert_eq!(report.upserted, 3);
    assert_eq!(report.uids.len(), 2);
    assert_eq!(report.cached, 2);
    assert_eq!(report.uids["alice"], existing);
    assert!(report.uids["bob"].is_new());

    let stats = graph.stats();
    assert_eq!(stats.queries, 1);
    assert_eq!(stats.mutations, 1);
    assert_eq!(stats.commits, 1);
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn cached_run_issues_no_queries() {
    let graph = InMemoryGraph::new();
    let cache = UidCache::new();
    cache.insert("alice", Uid::existing("0x99")).unwrap();

    let report = Client::new()
        .batch(&graph)
        .with_cache(cache)
        .run(vec![person("alice")])
        .unwrap();

    assert_eq!(report.uids["alice"].value(), "0x99");
    assert_eq!(graph.stats().queries, 0);
    assert_eq!(graph.stats().mutations, 0);
}

#[test]
fn existing_node_is_updated_not_duplicated() {
    let graph = InMemoryGraph::new();
    let existing = graph.seed(&person("alice")).unwrap();

    let node = person("alice").with(Duple::new("age", 41));
    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(node))
        .unwrap();

    let uid = &report.uids["alice"];
    assert_eq!(uid.value(), existing.value());
    assert!(!uid.is_new());
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.node(uid.value()).unwrap()["age"].lexical(), "41");
}

#[test]
fn sequential_runs_resolve_to_the_same_uid() {
    let graph = InMemoryGraph::new();
    let client = Client::new();

    let first = client.upsert_one(&graph, person("alice")).unwrap();
    let second = client.upsert_one(&graph, person("alice")).unwrap();

    assert_eq!(first.value(), second.value());
    assert!(first.is_new());
    assert!(!second.is_new());
}

#[test]
fn conflict_is_retried_to_success() {
    let graph = InMemoryGraph::new();
    graph.abort_next_commits(1);
    let logger = BufferLogger::new();

    let report = Client::new()
        .with_logger(Arc::new(logger.clone()))
        .mutate(&graph, Operation::SingleNode(person("alice")))
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.conflicts, 1);
    assert!(report.uids["alice"].is_new());
    assert_eq!(graph.stats().aborts, 1);
    assert_eq!(graph.node_count(), 1);
    assert!(logger
        .lines()
        .contains(&"[UPSERT] conflict alice attempt 1".to_string()));
}

#[test]
fn aborted_query_is_retried_to_success() {
    let graph = ContendedGraph::default().abort_next_queries(1);

    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(person("alice")))
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.conflicts, 1);
    assert!(report.uids["alice"].is_new());
    assert_eq!(graph.inner.stats().queries, 1);
    assert_eq!(graph.inner.node_count(), 1);
}

#[test]
fn aborted_mutation_is_retried_to_success() {
    let graph = ContendedGraph::default().abort_next_mutations(1);

    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(person("alice")))
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.conflicts, 1);
    assert!(report.uids["alice"].is_new());
    assert_eq!(graph.inner.stats().mutations, 1);
    assert_eq!(graph.inner.stats().commits, 1);
    assert_eq!(graph.inner.node_count(), 1);
}

#[test]
fn invalid_unique_predicate_fails_before_the_store() {
    let graph = InMemoryGraph::new();
    let node = DupleNode::new("alice").with(Duple::unique("a>b", "v"));

    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(node))
        .unwrap();

    assert!(matches!(
        &report.failures[0].1,
        UpsertError::Query(QueryError::InvalidPredicate { predicate }) if predicate == "a>b"
    ));
    assert_eq!(graph.stats().queries, 0);
    assert_eq!(graph.stats().mutations, 0);
}

#[test]
fn invalid_plain_predicate_fails_before_the_mutation() {
    let graph = InMemoryGraph::new();
    let node = person("alice").with(Duple::new("home page", "example.com"));

    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(node))
        .unwrap();

    assert!(matches!(
        &report.failures[0].1,
        UpsertError::InvalidPredicate { predicate } if predicate == "home page"
    ));
    assert_eq!(graph.stats().queries, 1);
    assert_eq!(graph.stats().mutations, 0);
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn retry_limit_reports_exhaustion() {
    let graph = InMemoryGraph::new();
    graph.abort_next_commits(1);
    let client = Client::new().with_config(UpsertConfig::new().with_max_conflict_retries(0));

    let report = client
        .mutate(&graph, Operation::SingleNode(person("alice")))
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    let (identifier, error) = &report.failures[0];
    assert_eq!(identifier, "alice");
    assert!(matches!(
        error,
        UpsertError::RetriesExhausted { attempts: 1, .. }
    ));
    assert_eq!(graph.node_count(), 0);
}

#[test]
fn ambiguous_match_is_listed_under_best_effort() {
    let graph = InMemoryGraph::new();
    graph.seed(&person("dup")).unwrap();
    graph.seed(&person("dup")).unwrap();

    let report = Client::new()
        .mutate(
            &graph,
            Operation::MultiNode(vec![person("dup"), person("bob"), person("carol")]),
        )
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "dup");
    assert!(report.failures[0].1.is_match_error());
    assert_eq!(report.uids.len(), 2);
    assert_eq!(graph.node_count(), 4);
}

#[test]
fn ambiguous_match_stops_a_fail_fast_run() {
    let graph = InMemoryGraph::new();
    graph.seed(&person("dup")).unwrap();
    graph.seed(&person("dup")).unwrap();
    graph.reset_stats();

    let client = Client::new().with_config(
        UpsertConfig::new()
            .with_workers(1)
            .with_failure_policy(FailurePolicy::FailFast),
    );

    let err = client
        .mutate(
            &graph,
            Operation::MultiNode(vec![person("dup"), person("bob"), person("carol")]),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        UpsertError::Query(QueryError::TooManyResponses {
            function: "find_decoded_uid"
        })
    ));
    assert_eq!(graph.stats().mutations, 0);
}

#[test]
fn fail_fast_leaves_caller_token_usable() {
    let graph = InMemoryGraph::new();
    graph.seed(&person("dup")).unwrap();
    graph.seed(&person("dup")).unwrap();
    let cancel = CancelToken::new();

    let client = Client::new().with_config(
        UpsertConfig::new()
            .with_workers(1)
            .with_failure_policy(FailurePolicy::FailFast),
    );

    let err = client
        .batch(&graph)
        .with_cancel(cancel.clone())
        .run(vec![person("dup"), person("bob")])
        .unwrap_err();
    assert!(err.is_match_error());
    assert!(!cancel.is_cancelled());

    let report = client
        .batch(&graph)
        .with_cancel(cancel)
        .run(vec![person("bob")])
        .unwrap();
    assert!(report.uids["bob"].is_new());
}

#[test]
fn store_query_failure_carries_function_and_query() {
    let graph = InMemoryGraph::new();
    graph.fail_next_queries(1);

    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(person("alice")))
        .unwrap();

    let (_, error) = &report.failures[0];
    match error {
        UpsertError::Query(QueryError::Store {
            function,
            query,
            source,
        }) => {
            assert_eq!(*function, "execute_query");
            assert!(query.contains("eq(<email>, \"alice@example.com\")"));
            assert_eq!(*source, StoreError::Query("QUERY_ERROR".into()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn mutate_rejection_is_tagged_with_identifier() {
    let graph = ReadOnlyGraph::default();

    let report = Client::new()
        .mutate(&graph, Operation::SingleNode(person("alice")))
        .unwrap();

    assert!(matches!(
        &report.failures[0].1,
        UpsertError::Mutate { identifier, source: StoreError::Mutate(_) } if identifier == "alice"
    ));
    assert_eq!(graph.inner.node_count(), 0);
}

#[test]
fn missing_assigned_uid_fails_the_item() {
    let graph = ForgetfulGraph::default();

    let err = Client::new()
        .upsert_one(&graph, person("alice"))
        .unwrap_err();

    assert!(matches!(err, UpsertError::MissingAssignedUid { identifier } if identifier == "alice"));
}

#[test]
fn cancelled_run_skips_everything_without_blocking() {
    let graph = InMemoryGraph::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    let client = Client::new().with_config(
        UpsertConfig::new()
            .with_workers(2)
            .with_queue_capacity(1),
    );
    let report = client
        .batch(&graph)
        .with_cancel(cancel)
        .run(people(20))
        .unwrap();

    assert_eq!(report.skipped.len(), 20);
    assert!(report.uids.is_empty());
    assert_eq!(graph.stats().queries, 0);
    assert_eq!(graph.stats().mutations, 0);
}

#[test]
fn cancelling_mid_run_stops_new_mutations() {
    let graph = InMemoryGraph::new();
    let cancel = CancelToken::new();

    let client = Client::new()
        .with_logger(cancel_on_commit(&cancel))
        .with_config(UpsertConfig::new().with_workers(1).with_queue_capacity(1));
    let report = client
        .batch(&graph)
        .with_cancel(cancel.clone())
        .run(people(5))
        .unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(report.uids.len(), 1);
    assert_eq!(report.skipped.len(), 4);
    assert_eq!(graph.stats().mutations, 1);
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn node_without_unique_duples_is_always_created() {
    let graph = InMemoryGraph::new();
    let client = Client::new();
    let node = DupleNode::new("anon").with(Duple::new("note", "hello"));

    let first = client.upsert_one(&graph, node.clone()).unwrap();
    let second = client.upsert_one(&graph, node).unwrap();

    assert_ne!(first.value(), second.value());
    assert_eq!(graph.stats().queries, 0);
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn string_map_node_is_keyed_by_predicate_key() {
    let graph = InMemoryGraph::new();
    let client = Client::new().with_predicate_key("email");

    let mut row = HashMap::new();
    row.insert("email".to_string(), "alice@example.com".to_string());
    row.insert("city".to_string(), "Lisbon".to_string());

    let first = client
        .mutate(&graph, Operation::StringMap(row.clone()))
        .unwrap();
    row.insert("city".to_string(), "Porto".to_string());
    let second = client.mutate(&graph, Operation::StringMap(row)).unwrap();

    let uid = &first.uids["alice@example.com"];
    assert_eq!(second.uids["alice@example.com"].value(), uid.value());
    assert_eq!(graph.node(uid.value()).unwrap()["city"].lexical(), "Porto");
}

#[test]
fn empty_input_completes_immediately() {
    let graph = InMemoryGraph::new();

    let report = Client::new()
        .mutate(&graph, Operation::MultiNode(Vec::new()))
        .unwrap();

    assert!(report.is_success());
    assert!(report.uids.is_empty());
    assert_eq!(graph.stats().queries, 0);
}

#[test]
fn progress_counts_every_item() {
    let graph = InMemoryGraph::new();
    let progress = Arc::new(CounterProgress::new());

    Client::new()
        .with_progress(progress.clone())
        .mutate(&graph, Operation::MultiNode(people(3)))
        .unwrap();

    assert_eq!(
        progress.snapshot(),
        ProgressUpdate {
            completed: 3,
            total: Some(3)
        }
    );
}

#[cfg(feature = "emitter")]
#[test]
fn emitter_progress_reaches_listeners() {
    use graph_upsert::{EmitterProgress, EventEmitter};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    let seen = Arc::new(AtomicU64::new(0));
    let flag = Arc::clone(&seen);
    let mut emitter = EventEmitter::new();
    emitter.on(
        graph_upsert::report::PROGRESS_EVENT,
        move |update: ProgressUpdate| {
            flag.fetch_max(update.completed, Ordering::SeqCst);
        },
    );

    let graph = InMemoryGraph::new();
    Client::new()
        .with_progress(Arc::new(EmitterProgress::new(emitter)))
        .mutate(&graph, Operation::MultiNode(people(4)))
        .unwrap();

    // Listeners run on their own threads
    thread::sleep(Duration::from_millis(50));
    assert_eq!(seen.load(Ordering::SeqCst), 4);
}
