//! In-memory pipeline example
//!
//! Feeds a small synthetic clickstream through the pipeline and prints what
//! reached each table.
//!
//! Run with: cargo run --example pipeline_example

use retail_processor::config::{AccumulationMode, LoggingConfig};
use retail_processor::metrics::MetricsRegistry;
use retail_processor::pipeline::StreamPipelineBuilder;
use retail_processor::sink::InMemoryTableSink;
use retail_processor::telemetry::init_logging;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

fn item(id: usize) -> serde_json::Value {
    json!({
        "item_name": format!("Item {}", id),
        "item_id": id.to_string(),
        "price": 10.0 + id as f64,
        "item_brand": "Google",
        "item_category": "Apparel",
        "item_category_2": "Mens",
        "item_category_3": "Shirts",
        "item_category_4": "Tshirts",
        "item_variant": "Black",
        "item_list_name": "Search Results",
        "item_list_id": "SR123",
        "quantity": 1
    })
}

fn clickstream() -> Vec<Vec<u8>> {
    let users = ["UID00001", "UID00002", "UID00003"];
    let mut events = Vec::new();

    for i in 0..30 {
        let user = users[i % users.len()];
        let event = match i % 3 {
            0 => "view_item",
            1 => "add_to_cart",
            _ => "purchase",
        };

        let payload = if event == "purchase" {
            json!({
                "event_datetime": "2020-11-16 23:10:04",
                "event": event,
                "user_id": user,
                "client_id": "52393559",
                "page": "/checkout",
                "page_previous": "/cart",
                "ecommerce": {"purchase": {"value": 19.5 + i as f64, "items": [item(i)]}}
            })
        } else {
            json!({
                "event_datetime": "2020-11-16 22:59:59",
                "event": event,
                "user_id": user,
                "client_id": "52393559",
                "page": format!("/product-{}", i),
                "page_previous": "/home",
                "ecommerce": {"items": [item(i)]}
            })
        };
        events.push(payload.to_string().into_bytes());
    }

    // A few events the pipeline drops
    events.push(b"{truncated".to_vec());
    events.push(json!({"event": "page_view", "user_id": "UID00001"}).to_string().into_bytes());

    events
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LoggingConfig::default())?;

    let sink = InMemoryTableSink::new();
    let pipeline = StreamPipelineBuilder::new()
        .with_name("clickstream-demo")
        .with_trigger_count(5)
        .with_accumulation_mode(AccumulationMode::Accumulating)
        .with_parallelism(1)
        .with_sink(Arc::new(sink.clone()))
        .with_global_metrics()
        .build()?;

    let executor = pipeline.create_executor()?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        for payload in clickstream() {
            if tx.send(payload).await.is_err() {
                break;
            }
        }
    });

    executor.run(rx).await?;
    let report = executor.shutdown().await?;

    info!(stats = ?report.stats, "Pipeline finished");

    for table in sink.tables() {
        println!("{}: {} rows", table, sink.row_count(&table));
    }
    for row in sink.rows("ecommerce_sink.beam_aggregated") {
        println!("  {}", serde_json::to_string(&row)?);
    }

    println!("\n{}", MetricsRegistry::global().encode()?);
    Ok(())
}
