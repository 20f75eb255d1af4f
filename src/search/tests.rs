//! Search Module Tests
//!
//! Validates the fan-out aggregator and the search routes.
//!
//! ## Test Scopes
//! - **Fan-out**: Completeness, partial and total shard failure, de-duplication, limits.
//! - **Time bounds**: Per-shard timeouts, request deadlines and cancellation on drop.
//! - **Scenario**: The four-book corpus against the in-memory store, both layouts.
//! - **Handlers**: Validation, status codes and the phase timing headers.

#[cfg(test)]
mod tests {
    use crate::app::AppState;
    use crate::error::SearchError;
    use crate::search::aggregator::{
        DEFAULT_LIMIT, FanoutAggregator, FanoutConfig, ShardFailureKind, Topology, merge_results,
    };
    use crate::search::handlers::{
        HEADER_PHASE_AGGREGATE, HEADER_PHASE_FANOUT, HEADER_PHASE_PARSE, HEADER_SHARDS_FAILED,
        HEADER_SHARDS_QUERIED, default_limit, handle_advanced, handle_composite_shard,
        handle_search, handle_shard, handle_sharded, parse_limit,
    };
    use crate::search::types::{
        AdvancedCriteria, AdvancedSearchRequest, Book, SearchRequest, ShardParams,
    };
    use crate::sharding::CompositeShard;
    use crate::storage::memory::MemoryStore;
    use crate::storage::port::{BookStore, ShardQueryPort};

    use async_trait::async_trait;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::{Extension, Json};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    fn book(id: &str, title: &str) -> Book {
        Book::new(id, title, vec![])
    }

    fn ids(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.book_id.as_str()).collect()
    }

    // ============================================================
    // SCRIPTED SHARD PORT
    // ============================================================

    /// Counts shard calls whose future was dropped, finished or not.
    struct DropGuard(Arc<AtomicUsize>);

    impl Drop for DropGuard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Shard port whose behavior is scripted per shard key.
    #[derive(Default)]
    struct ScriptedPort {
        items: HashMap<String, Vec<Book>>,
        failing: HashSet<String>,
        delays: HashMap<String, Duration>,
        hanging: HashSet<String>,
        calls: AtomicUsize,
        finished: Arc<AtomicUsize>,
    }

    impl ScriptedPort {
        fn with_items(mut self, shard: &str, books: Vec<Book>) -> Self {
            self.items.insert(shard.to_string(), books);
            self
        }

        fn failing(mut self, shard: &str) -> Self {
            self.failing.insert(shard.to_string());
            self
        }

        fn delayed(mut self, shard: &str, delay: Duration) -> Self {
            self.delays.insert(shard.to_string(), delay);
            self
        }

        fn hanging(mut self, shard: &str) -> Self {
            self.hanging.insert(shard.to_string());
            self
        }

        fn every_letter(mut self, f: impl Fn(Self, &str) -> Self) -> Self {
            for c in LETTERS.chars() {
                self = f(self, &c.to_string());
            }
            self
        }

        async fn answer(&self, shard: &str, limit: usize) -> anyhow::Result<Vec<Book>> {
            let _guard = DropGuard(Arc::clone(&self.finished));
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.hanging.contains(shard) {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.delays.get(shard) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(shard) {
                anyhow::bail!("shard {} unavailable", shard);
            }
            let mut books = self.items.get(shard).cloned().unwrap_or_default();
            books.truncate(limit);
            Ok(books)
        }
    }

    #[async_trait]
    impl ShardQueryPort for ScriptedPort {
        async fn query_shard(
            &self,
            prefix: &str,
            _query: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<Book>> {
            self.answer(prefix, limit).await
        }

        async fn query_by_composite_shard(
            &self,
            shard_key: &str,
            _query: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<Book>> {
            self.answer(shard_key, limit).await
        }
    }

    #[async_trait]
    impl BookStore for ScriptedPort {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<Book>> {
            anyhow::bail!("store offline")
        }

        async fn search_advanced(
            &self,
            _criteria: &AdvancedCriteria,
            _limit: usize,
        ) -> anyhow::Result<Vec<Book>> {
            anyhow::bail!("store offline")
        }

        async fn get_book(&self, _book_id: &str) -> anyhow::Result<Option<Book>> {
            Ok(None)
        }

        async fn get_books(&self, _book_ids: &[String]) -> anyhow::Result<Vec<Book>> {
            Ok(Vec::new())
        }
    }

    fn aggregator(port: ScriptedPort) -> FanoutAggregator<ScriptedPort> {
        FanoutAggregator::new(Arc::new(port), FanoutConfig::default())
    }

    /// Two distinct books on every letter shard.
    fn two_per_letter() -> ScriptedPort {
        ScriptedPort::default().every_letter(|port, letter| {
            port.with_items(
                letter,
                vec![
                    book(&format!("{}-1", letter), &format!("{} first", letter)),
                    book(&format!("{}-2", letter), &format!("{} second", letter)),
                ],
            )
        })
    }

    fn four_book_corpus() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(Book::new(
            "OL1",
            "The Great Gatsby",
            vec!["F. Scott Fitzgerald".to_string()],
        ));
        store.insert(Book::new(
            "OL2",
            "Harry Potter...",
            vec!["J.K. Rowling".to_string()],
        ));
        store.insert(Book::new(
            "OL3",
            "Hamlet",
            vec!["William Shakespeare".to_string()],
        ));
        store.insert(Book::new(
            "OL4",
            "Clean Architecture",
            vec!["Robert C. Martin".to_string()],
        ));
        store
    }

    // ============================================================
    // FAN-OUT - COMPLETENESS
    // ============================================================

    #[tokio::test]
    async fn test_broad_search_queries_every_letter() {
        let agg = aggregator(two_per_letter());

        let report = agg.broad_search("anything", 100).await.unwrap();

        assert_eq!(report.topology, Topology::Legacy);
        assert_eq!(report.shards_queried, 26);
        assert_eq!(report.items.len(), 52);
        assert!(report.failures.is_empty());
        assert!(!report.all_shards_failed());
    }

    #[tokio::test]
    async fn test_broad_search_truncates_to_limit() {
        let agg = aggregator(two_per_letter());

        let report = agg.broad_search("anything", 10).await.unwrap();

        assert_eq!(report.items.len(), 10);
    }

    #[tokio::test]
    async fn test_zero_limit_uses_default() {
        let agg = aggregator(two_per_letter());

        let report = agg.broad_search("anything", 0).await.unwrap();

        assert_eq!(report.items.len(), DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn test_result_ids_are_unique() {
        let port = ScriptedPort::default()
            .with_items("A", vec![book("OL1W", "A copy"), book("OL2W", "Another")])
            .with_items("B", vec![book("OL1W", "A copy")])
            .with_items("Z", vec![book("OL1W", "A copy"), book("OL3W", "Zebra")]);
        let agg = aggregator(port);

        let report = agg.broad_search("copy", 10).await.unwrap();

        let unique: HashSet<&str> = ids(&report.items).into_iter().collect();
        assert_eq!(unique.len(), report.items.len());
        assert_eq!(report.items.len(), 3);
        assert_eq!(
            report.items.iter().filter(|b| b.book_id == "OL1W").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_all_shards_launched_before_any_finishes() {
        // Every shard sleeps 100ms; sequential calls would take 2.6s.
        let port = two_per_letter().every_letter(|port, letter| {
            port.delayed(letter, Duration::from_millis(100))
        });
        let agg = aggregator(port);

        let started = std::time::Instant::now();
        let report = agg.broad_search("anything", 100).await.unwrap();

        assert_eq!(report.items.len(), 52);
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert!(report.timing.fanout >= Duration::from_millis(100));
    }

    // ============================================================
    // FAN-OUT - SHARD FAILURES
    // ============================================================

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let port = ScriptedPort::default().every_letter(|port, letter| {
            if letter < "N" {
                port.failing(letter)
            } else {
                port.with_items(letter, vec![book(&format!("{}-1", letter), letter)])
            }
        });
        let agg = aggregator(port);

        let report = agg.broad_search("anything", 100).await.unwrap();

        assert_eq!(report.items.len(), 13);
        assert_eq!(report.failures.len(), 13);
        assert!(
            report
                .failures
                .iter()
                .all(|f| matches!(f.kind, ShardFailureKind::Error(_)))
        );
        let failed: HashSet<&str> = report.failures.iter().map(|f| f.shard.as_str()).collect();
        assert!(failed.contains("A"));
        assert!(failed.contains("M"));
        assert!(!failed.contains("N"));
    }

    #[tokio::test]
    async fn test_total_failure_returns_empty_success() {
        let port = ScriptedPort::default().every_letter(|port, letter| port.failing(letter));
        let agg = aggregator(port);

        let report = agg.broad_search("anything", 10).await.unwrap();

        assert!(report.items.is_empty());
        assert_eq!(report.failures.len(), 26);
        assert!(report.all_shards_failed());
    }

    #[tokio::test]
    async fn test_error_message_kept_in_diagnostics() {
        let port = ScriptedPort::default().failing("Q");
        let agg = aggregator(port);

        let report = agg.broad_search("anything", 10).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].shard, "Q");
        match &report.failures[0].kind {
            ShardFailureKind::Error(message) => assert!(message.contains("unavailable")),
            other => panic!("unexpected failure kind {:?}", other),
        }
    }

    // ============================================================
    // FAN-OUT - VALIDATION
    // ============================================================

    #[tokio::test]
    async fn test_empty_query_rejected_before_fanout() {
        let port = Arc::new(two_per_letter());
        let agg = FanoutAggregator::new(Arc::clone(&port), FanoutConfig::default());

        for query in ["", "   ", "\t\n"] {
            let err = agg.broad_search(query, 10).await.unwrap_err();
            assert!(matches!(err, SearchError::InvalidRequest { .. }));
            assert_eq!(err.code(), "invalid_request");
        }

        assert_eq!(port.calls.load(Ordering::SeqCst), 0);
    }

    // ============================================================
    // FAN-OUT - TIME BOUNDS
    // ============================================================

    #[tokio::test]
    async fn test_slow_shard_times_out() {
        let port = two_per_letter().delayed("K", Duration::from_secs(10));
        let config = FanoutConfig {
            shard_timeout: Some(Duration::from_millis(50)),
            deadline: None,
        };
        let agg = FanoutAggregator::new(Arc::new(port), config);

        let report = agg.broad_search("anything", 100).await.unwrap();

        assert_eq!(report.items.len(), 50);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].shard, "K");
        assert_eq!(report.failures[0].kind, ShardFailureKind::TimedOut);
    }

    #[tokio::test]
    async fn test_deadline_excludes_stragglers() {
        let port = two_per_letter().hanging("B").hanging("X");
        let config = FanoutConfig {
            shard_timeout: None,
            deadline: Some(Duration::from_millis(100)),
        };
        let agg = FanoutAggregator::new(Arc::new(port), config);

        let report = tokio::time::timeout(Duration::from_secs(5), agg.broad_search("anything", 100))
            .await
            .expect("deadline must bound the fan-out")
            .unwrap();

        assert_eq!(report.items.len(), 48);
        let mut failed: Vec<&str> = report.failures.iter().map(|f| f.shard.as_str()).collect();
        failed.sort();
        assert_eq!(failed, vec!["B", "X"]);
        assert!(
            report
                .failures
                .iter()
                .all(|f| f.kind == ShardFailureKind::DeadlineExceeded)
        );
    }

    #[tokio::test]
    async fn test_dropping_request_cancels_shard_calls() {
        let port = Arc::new(ScriptedPort::default().every_letter(|port, letter| port.hanging(letter)));
        let finished = Arc::clone(&port.finished);
        let agg = FanoutAggregator::new(Arc::clone(&port), FanoutConfig::default());

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), agg.broad_search("anything", 10)).await;
        assert!(outcome.is_err());

        // Give the runtime a chance to drop the aborted tasks.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(port.calls.load(Ordering::SeqCst), 26);
        assert_eq!(finished.load(Ordering::SeqCst), 26);
    }

    // ============================================================
    // FAN-OUT - COMPOSITE LAYOUT
    // ============================================================

    #[tokio::test]
    async fn test_composite_search_queries_every_shard() {
        let mut port = ScriptedPort::default();
        for shard in CompositeShard::ALL {
            let key = shard.as_str();
            port = port.with_items(key, vec![book(&format!("{}-1", key), key)]);
        }
        let agg = aggregator(port);

        let report = agg.composite_search("anything", 100).await.unwrap();

        assert_eq!(report.topology, Topology::Composite);
        assert_eq!(report.shards_queried, 17);
        assert_eq!(report.items.len(), 17);
        assert!(report.items.iter().any(|b| b.book_id == "0-1"));
    }

    #[test]
    fn test_topology_parse() {
        assert_eq!(Topology::parse(None), Some(Topology::Legacy));
        assert_eq!(Topology::parse(Some("")), Some(Topology::Legacy));
        assert_eq!(Topology::parse(Some("letters")), Some(Topology::Legacy));
        assert_eq!(Topology::parse(Some("Composite")), Some(Topology::Composite));
        assert_eq!(Topology::parse(Some("ring")), None);

        assert_eq!(Topology::Legacy.shards().len(), 26);
        assert_eq!(Topology::Composite.shards().len(), 17);
        assert_eq!(Topology::Composite.to_string(), "composite");
    }

    // ============================================================
    // MERGE
    // ============================================================

    #[test]
    fn test_merge_keeps_first_occurrence_in_arrival_order() {
        let merged = merge_results(
            vec![
                book("b", "first b"),
                book("a", "first a"),
                book("b", "second b"),
                book("c", "c"),
            ],
            10,
        );

        assert_eq!(ids(&merged), vec!["b", "a", "c"]);
        assert_eq!(merged[0].title, "first b");
    }

    #[test]
    fn test_merge_with_unbounded_limit() {
        let merged = merge_results(vec![book("a", ""), book("b", ""), book("a", "")], usize::MAX);

        assert_eq!(ids(&merged), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_truncates_after_dedup() {
        let merged = merge_results(
            vec![book("a", ""), book("a", ""), book("b", ""), book("c", "")],
            2,
        );

        assert_eq!(ids(&merged), vec!["a", "b"]);
    }

    // ============================================================
    // SCENARIO - FOUR BOOK CORPUS
    // ============================================================

    #[tokio::test]
    async fn test_scenario_broad_search() {
        let agg = FanoutAggregator::new(Arc::new(four_book_corpus()), FanoutConfig::default());

        let report = agg.broad_search("the", 20).await.unwrap();

        assert_eq!(ids(&report.items), vec!["OL1"]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_huge_limit_returns_all_matches() {
        let agg = FanoutAggregator::new(Arc::new(four_book_corpus()), FanoutConfig::default());
        let limit = parse_limit(Some("100000000000000000"), DEFAULT_LIMIT);
        assert_eq!(limit, 100_000_000_000_000_000);

        let report = agg.broad_search("the", limit).await.unwrap();
        assert_eq!(ids(&report.items), vec!["OL1"]);

        let report = agg.composite_search("a", usize::MAX).await.unwrap();
        assert_eq!(report.items.len(), 4);
    }

    #[tokio::test]
    async fn test_scenario_composite_search() {
        let agg = FanoutAggregator::new(Arc::new(four_book_corpus()), FanoutConfig::default());

        let report = agg.composite_search("the", 20).await.unwrap();
        assert_eq!(ids(&report.items), vec!["OL1"]);

        let report = agg.composite_search("shakespeare", 20).await.unwrap();
        assert_eq!(ids(&report.items), vec!["OL3"]);
    }

    // ============================================================
    // HANDLERS - LIMIT PARSING
    // ============================================================

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None, 20), 20);
        assert_eq!(parse_limit(Some("5"), 20), 5);
        assert_eq!(parse_limit(Some("0"), 20), 20);
        assert_eq!(parse_limit(Some(""), 20), 20);
        assert_eq!(parse_limit(Some("-3"), 20), 20);
        assert_eq!(parse_limit(Some("7x"), 20), 20);
        assert_eq!(parse_limit(Some("99999999999999999999999"), 20), 20);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(default_limit(0), DEFAULT_LIMIT);
        assert_eq!(default_limit(-1), DEFAULT_LIMIT);
        assert_eq!(default_limit(3), 3);
    }

    // ============================================================
    // HANDLERS - ROUTES
    // ============================================================

    fn memory_state() -> Arc<AppState> {
        AppState::new(Arc::new(four_book_corpus()), FanoutConfig::default())
    }

    fn params(query: &str, limit: Option<&str>, topology: Option<&str>) -> ShardParams {
        ShardParams {
            query: Some(query.to_string()),
            limit: limit.map(str::to_string),
            topology: topology.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_sharded_handler_sets_phase_headers() {
        let response = handle_sharded(
            Extension(memory_state()),
            Query(params("the", None, None)),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        for name in [HEADER_PHASE_PARSE, HEADER_PHASE_FANOUT, HEADER_PHASE_AGGREGATE] {
            let value = headers.get(name).unwrap().to_str().unwrap();
            assert!(value.parse::<u64>().is_ok(), "{} = {}", name, value);
        }
        assert_eq!(headers.get(HEADER_SHARDS_QUERIED).unwrap(), "26");
        assert_eq!(headers.get(HEADER_SHARDS_FAILED).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_sharded_handler_reports_total_failure() {
        let port = ScriptedPort::default().every_letter(|port, letter| port.failing(letter));
        let state = AppState::new(Arc::new(port), FanoutConfig::default());

        let response = handle_sharded(Extension(state), Query(params("x", None, None)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(HEADER_SHARDS_FAILED).unwrap(), "26");
    }

    #[tokio::test]
    async fn test_sharded_handler_composite_topology() {
        let response = handle_sharded(
            Extension(memory_state()),
            Query(params("the", Some("5"), Some("composite"))),
        )
        .await
        .unwrap();

        assert_eq!(response.headers().get(HEADER_SHARDS_QUERIED).unwrap(), "17");
    }

    #[tokio::test]
    async fn test_sharded_handler_rejects_bad_input() {
        let err = handle_sharded(Extension(memory_state()), Query(params("  ", None, None)))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = handle_sharded(
            Extension(memory_state()),
            Query(params("the", None, Some("ring"))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "invalid_topology");
    }

    #[tokio::test]
    async fn test_search_handler() {
        let Json(body) = handle_search(
            Extension(memory_state()),
            Ok(Json(SearchRequest {
                query: "ROWLING".to_string(),
                limit: 0,
            })),
        )
        .await
        .unwrap();

        assert_eq!(body.count, 1);
        assert_eq!(body.items[0].book_id, "OL2");

        let err = handle_search(
            Extension(memory_state()),
            Ok(Json(SearchRequest {
                query: " ".to_string(),
                limit: 5,
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[tokio::test]
    async fn test_search_handler_storage_error_is_internal() {
        let state = AppState::new(Arc::new(ScriptedPort::default()), FanoutConfig::default());

        let err = handle_search(
            Extension(state),
            Ok(Json(SearchRequest {
                query: "the".to_string(),
                limit: 5,
            })),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_error");
    }

    #[tokio::test]
    async fn test_advanced_handler() {
        let Json(body) = handle_advanced(
            Extension(memory_state()),
            Ok(Json(AdvancedSearchRequest {
                title: "  great ".to_string(),
                author: "fitzgerald".to_string(),
                subject: vec!["fiction".to_string()],
                limit: 0,
            })),
        )
        .await
        .unwrap();

        assert_eq!(ids(&body.items), vec!["OL1"]);
    }

    #[tokio::test]
    async fn test_shard_handler_requires_single_letter() {
        let err = handle_shard(
            Extension(memory_state()),
            Path("AB".to_string()),
            Query(ShardParams::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "invalid_prefix");

        let Json(body) = handle_shard(
            Extension(memory_state()),
            Path("h".to_string()),
            Query(ShardParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(ids(&body.items), vec!["OL2", "OL3"]);
    }

    #[tokio::test]
    async fn test_composite_handler() {
        let Json(body) = handle_composite_shard(
            Extension(memory_state()),
            Path("C".to_string()),
            Query(ShardParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(ids(&body.items), vec!["OL4"]);

        let Json(body) = handle_composite_shard(
            Extension(memory_state()),
            Path("ZZ99".to_string()),
            Query(ShardParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(body.count, 0);

        let err = handle_composite_shard(
            Extension(memory_state()),
            Path(" ".to_string()),
            Query(ShardParams::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "invalid_shard");
    }
}
