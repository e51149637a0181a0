//! End-to-end tests for the clickstream pipeline
//!
//! Every test drives payloads through a [`StreamExecutor`] backed by an
//! [`InMemoryTableSink`] and inspects the rows that reached each table after
//! shutdown.

use retail_processor::config::{AccumulationMode, ProcessorConfig};
use retail_processor::error::{ProcessorError, ProjectionError};
use retail_processor::metrics::PipelineMetrics;
use retail_processor::pipeline::{Outcome, StreamExecutor, StreamPipelineBuilder};
use retail_processor::sink::{Destination, InMemoryTableSink};
use retail_processor::{classify, decode};
use retail_types::{EventKind, ProjectedRecord, TableRow};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

const ITEM_VIEWS: &str = "ecommerce_sink.beam_item_views";
const ADD_TO_CARTS: &str = "ecommerce_sink.beam_add_to_carts";
const AGGREGATES: &str = "ecommerce_sink.beam_aggregated";

// ============================================================================
// Fixtures
// ============================================================================

fn item() -> Value {
    json!({
        "item_name": "Donut Friday Scented T-Shirt",
        "item_id": "67890",
        "price": 33.75,
        "item_brand": "Google",
        "item_category": "Apparel",
        "item_category_2": "Mens",
        "item_category_3": "Shirts",
        "item_category_4": "Tshirts",
        "item_variant": "Black",
        "item_list_name": "Search Results",
        "item_list_id": "SR123",
        "quantity": 2
    })
}

fn interaction(event: &str, user_id: &str, item: Value) -> Vec<u8> {
    json!({
        "event_datetime": "2020-11-16 22:59:59",
        "event": event,
        "user_id": user_id,
        "client_id": "52393559",
        "page": "/product-67890",
        "page_previous": "/category-tshirts",
        "ecommerce": { "items": [item] }
    })
    .to_string()
    .into_bytes()
}

fn view(user_id: &str) -> Vec<u8> {
    interaction("view_item", user_id, item())
}

fn cart_add(user_id: &str) -> Vec<u8> {
    interaction("add_to_cart", user_id, item())
}

fn purchase(user_id: &str, value: Value) -> Vec<u8> {
    json!({
        "event_datetime": "2020-11-16 23:10:04",
        "event": "purchase",
        "user_id": user_id,
        "client_id": "52393559",
        "page": "/checkout",
        "page_previous": "/cart",
        "ecommerce": {
            "purchase": {
                "transaction_id": "T-1",
                "value": value,
                "currency": "USD",
                "items": [item()]
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn config(trigger_count: u64, mode: AccumulationMode) -> ProcessorConfig {
    ProcessorConfig {
        trigger_count: Some(trigger_count),
        accumulation_mode: mode,
        parallelism: 1,
        ..ProcessorConfig::default()
    }
}

fn executor(config: &ProcessorConfig) -> (StreamExecutor, InMemoryTableSink) {
    let sink = InMemoryTableSink::new();
    let executor = StreamExecutor::new(config, Arc::new(sink.clone()), PipelineMetrics::new())
        .expect("valid config");
    (executor, sink)
}

fn text<'a>(row: &'a TableRow, column: &str) -> &'a str {
    row.get(column).and_then(|v| v.as_str()).unwrap_or_default()
}

fn sums(sink: &InMemoryTableSink) -> Vec<(String, f64)> {
    sink.rows(AGGREGATES)
        .iter()
        .map(|row| {
            (
                text(row, "user_id").to_string(),
                row.get("summed_value").and_then(|v| v.as_f64()).unwrap(),
            )
        })
        .collect()
}

// ============================================================================
// Projection paths
// ============================================================================

mod projection_tests {
    use super::*;

    #[tokio::test]
    async fn test_view_is_written_to_item_views() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        let outcome = executor.process(&view("UID00001")).await.unwrap();
        assert_eq!(outcome, Outcome::Projected(Destination::ItemViews));

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.item_views.written, 1);

        let rows = sink.rows(ITEM_VIEWS);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.len(), ProjectedRecord::COLUMNS.len());
        assert_eq!(text(row, "event"), "view_item");
        assert_eq!(text(row, "user_id"), "UID00001");
        assert_eq!(text(row, "item_category_3"), "Shirts");
        assert_eq!(text(row, "price"), "33.75");
        assert_eq!(text(row, "quantity"), "2");
        assert_eq!(sink.row_count(ADD_TO_CARTS), 0);
    }

    #[tokio::test]
    async fn test_cart_add_is_written_to_add_to_carts() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        executor.process(&cart_add("UID00002")).await.unwrap();
        executor.shutdown().await.unwrap();

        let rows = sink.rows(ADD_TO_CARTS);
        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0], "event"), "add_to_cart");
        assert_eq!(sink.row_count(ITEM_VIEWS), 0);
    }

    #[tokio::test]
    async fn test_missing_item_field_drops_event() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        let mut incomplete = item();
        incomplete
            .as_object_mut()
            .unwrap()
            .remove("item_category_3");

        let err = executor
            .process(&interaction("view_item", "UID00001", incomplete))
            .await
            .unwrap_err();
        match err {
            ProcessorError::Projection(ProjectionError::MissingField { field }) => {
                assert_eq!(field, "ecommerce.items[0].item_category_3");
            }
            other => panic!("unexpected error: {other}"),
        }

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.stats.projection_failures, 1);
        assert_eq!(sink.row_count(ITEM_VIEWS), 0);
    }

    #[tokio::test]
    async fn test_empty_items_list_drops_event() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        let payload = json!({
            "event_datetime": "2020-11-16 22:59:59",
            "event": "add_to_cart",
            "user_id": "UID00001",
            "client_id": "52393559",
            "page": "/p",
            "page_previous": "/q",
            "ecommerce": { "items": [] }
        })
        .to_string();

        let err = executor.process(payload.as_bytes()).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Projection(ProjectionError::EmptyItemsList)
        ));

        executor.shutdown().await.unwrap();
        assert_eq!(sink.row_count(ADD_TO_CARTS), 0);
    }

    #[tokio::test]
    async fn test_rows_keep_upstream_order() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        for i in 0..20 {
            executor.process(&view(&format!("UID{:05}", i))).await.unwrap();
        }
        executor.shutdown().await.unwrap();

        let users: Vec<String> = sink
            .rows(ITEM_VIEWS)
            .iter()
            .map(|row| text(row, "user_id").to_string())
            .collect();
        let expected: Vec<String> = (0..20).map(|i| format!("UID{:05}", i)).collect();
        assert_eq!(users, expected);
    }
}

// ============================================================================
// Purchase aggregation
// ============================================================================

mod aggregation_tests {
    use super::*;

    #[tokio::test]
    async fn test_tenth_purchase_emits_running_sums() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        for _ in 0..5 {
            executor.process(&purchase("A", json!(10))).await.unwrap();
            executor.process(&purchase("B", json!(5))).await.unwrap();
        }

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.aggregation.firings, 1);
        assert_eq!(
            sums(&sink),
            vec![("A".to_string(), 50.0), ("B".to_string(), 25.0)]
        );
    }

    #[tokio::test]
    async fn test_nine_purchases_emit_nothing() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        for _ in 0..9 {
            executor.process(&purchase("A", json!(1.5))).await.unwrap();
        }

        let state = executor.aggregation_state().await.unwrap();
        assert_eq!(state.element_count, 9);
        assert_eq!(state.firings, 0);

        executor.shutdown().await.unwrap();
        assert_eq!(sink.row_count(AGGREGATES), 0);
    }

    #[tokio::test]
    async fn test_firings_repeat_every_threshold() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        for _ in 0..35 {
            executor.process(&purchase("A", json!(1))).await.unwrap();
        }

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.aggregation.firings, 3);
        assert_eq!(report.stats.trigger_firings, 3);
        assert_eq!(
            sums(&sink),
            vec![
                ("A".to_string(), 10.0),
                ("A".to_string(), 20.0),
                ("A".to_string(), 30.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_accumulating_sums_never_decrease() {
        let (executor, sink) = executor(&config(2, AccumulationMode::Accumulating));

        for value in [3.0, 0.0, 7.25, 1.0, 0.5, 2.0] {
            executor.process(&purchase("A", json!(value))).await.unwrap();
        }
        executor.shutdown().await.unwrap();

        let totals: Vec<f64> = sums(&sink).into_iter().map(|(_, v)| v).collect();
        assert_eq!(totals, vec![3.0, 11.25, 13.75]);
        assert!(totals.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_discarding_mode_resets_after_firing() {
        let (executor, sink) = executor(&config(2, AccumulationMode::Discarding));

        for (user, value) in [("A", 1), ("A", 2), ("B", 4), ("A", 8)] {
            executor.process(&purchase(user, json!(value))).await.unwrap();
        }
        executor.shutdown().await.unwrap();

        assert_eq!(
            sums(&sink),
            vec![
                ("A".to_string(), 3.0),
                ("A".to_string(), 8.0),
                ("B".to_string(), 4.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_numeric_string_value_is_accepted() {
        let (executor, sink) = executor(&config(1, AccumulationMode::Accumulating));

        executor.process(&purchase("A", json!("19.99"))).await.unwrap();
        executor.shutdown().await.unwrap();

        assert_eq!(sums(&sink), vec![("A".to_string(), 19.99)]);
    }

    #[tokio::test]
    async fn test_invalid_purchase_value_is_not_counted() {
        let (executor, sink) = executor(&config(2, AccumulationMode::Accumulating));

        for value in [json!("free"), json!(-5), json!(null), json!({"amount": 1})] {
            let err = executor.process(&purchase("A", value)).await.unwrap_err();
            assert!(matches!(err, ProcessorError::Projection(_)));
        }

        let state = executor.aggregation_state().await.unwrap();
        assert_eq!(state.element_count, 0);

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.stats.projection_failures, 4);
        assert_eq!(report.stats.purchases_merged, 0);
        assert_eq!(sink.row_count(AGGREGATES), 0);
    }

    #[tokio::test]
    async fn test_purchase_does_not_reach_projection_tables() {
        let (executor, sink) = executor(&config(1, AccumulationMode::Accumulating));

        executor.process(&purchase("A", json!(10))).await.unwrap();
        executor.shutdown().await.unwrap();

        assert_eq!(sink.row_count(ITEM_VIEWS), 0);
        assert_eq!(sink.row_count(ADD_TO_CARTS), 0);
        assert_eq!(sink.row_count(AGGREGATES), 1);
    }
}

// ============================================================================
// Classification and drops
// ============================================================================

mod classification_tests {
    use super::*;

    #[test]
    fn test_decode_and_classify_are_deterministic() {
        for payload in [view("A"), cart_add("B"), purchase("C", json!(1))] {
            let first = decode(&payload).unwrap();
            let second = decode(&payload).unwrap();
            assert_eq!(first, second);
            assert_eq!(classify(&first), classify(&second));
        }
    }

    #[test]
    fn test_each_event_has_one_kind() {
        assert_eq!(classify(&decode(&view("A")).unwrap()), EventKind::View);
        assert_eq!(classify(&decode(&cart_add("A")).unwrap()), EventKind::CartAdd);
        assert_eq!(
            classify(&decode(&purchase("A", json!(1))).unwrap()),
            EventKind::Purchase
        );
        assert_eq!(
            classify(&decode(br#"{"event": "begin_checkout"}"#).unwrap()),
            EventKind::Other
        );
    }

    #[tokio::test]
    async fn test_mixed_stream_counts() {
        let (executor, sink) = executor(&config(10, AccumulationMode::Accumulating));

        let payloads: Vec<Vec<u8>> = vec![
            view("A"),
            b"{not json".to_vec(),
            cart_add("A"),
            br#"{"event": "page_view", "user_id": "A"}"#.to_vec(),
            br#"{"user_id": "A"}"#.to_vec(),
            purchase("A", json!(12)),
            br#"[1, 2, 3]"#.to_vec(),
        ];
        for payload in &payloads {
            let _ = executor.process(payload).await;
        }

        let report = executor.shutdown().await.unwrap();
        let stats = report.stats;
        assert_eq!(stats.events_received, 7);
        assert_eq!(stats.views, 1);
        assert_eq!(stats.cart_adds, 1);
        assert_eq!(stats.purchases, 1);
        assert_eq!(stats.decode_failures, 2);
        assert_eq!(stats.unclassified, 2);
        assert_eq!(stats.events_dropped(), 4);
        assert_eq!(sink.row_count(ITEM_VIEWS), 1);
        assert_eq!(sink.row_count(ADD_TO_CARTS), 1);
    }
}

// ============================================================================
// Running from a channel
// ============================================================================

mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_drains_channel() {
        let sink = InMemoryTableSink::new();
        let pipeline = StreamPipelineBuilder::new()
            .with_trigger_count(10)
            .with_parallelism(4)
            .with_sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        let executor = pipeline.create_executor().unwrap();

        let (tx, rx) = mpsc::channel(16);
        let producer = tokio::spawn(async move {
            for i in 0..20 {
                tx.send(view(&format!("V{}", i))).await.unwrap();
                tx.send(purchase("A", json!(1))).await.unwrap();
            }
        });

        executor.run(rx).await.unwrap();
        producer.await.unwrap();

        let report = executor.shutdown().await.unwrap();
        assert_eq!(report.stats.events_received, 40);
        assert_eq!(report.aggregation.merged, 20);
        assert_eq!(report.aggregation.firings, 2);
        assert_eq!(sink.row_count(ITEM_VIEWS), 20);
        assert_eq!(
            sums(&sink),
            vec![("A".to_string(), 10.0), ("A".to_string(), 20.0)]
        );
    }

    #[tokio::test]
    async fn test_executors_from_one_pipeline_keep_separate_sums() {
        let pipeline = StreamPipelineBuilder::new()
            .with_trigger_count(100)
            .build()
            .unwrap();

        let first = pipeline.create_executor().unwrap();
        let second = pipeline.create_executor().unwrap();

        first.process(&purchase("A", json!(5))).await.unwrap();

        assert_eq!(first.aggregation_state().await.unwrap().element_count, 1);
        assert_eq!(second.aggregation_state().await.unwrap().element_count, 0);

        first.shutdown().await.unwrap();
        second.shutdown().await.unwrap();
    }
}
