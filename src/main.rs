use book_search::app::{AppState, router};
use book_search::config::Settings;
use book_search::storage::BookStore;
use book_search::storage::dynamo::{DynamoStore, DynamoTable};
use book_search::storage::memory::MemoryStore;
use book_search::storage::seed::load_jsonl;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind_addr = settings.bind_addr()?;
    tracing::info!("Starting book search on {}", bind_addr);

    // 1. Storage backend:
    let store: Arc<dyn BookStore> = match &settings.books_table {
        Some(table) => {
            tracing::info!("Using DynamoDB table {}", table);
            let table = DynamoTable {
                table_name: table.clone(),
                prefix_index: settings.prefix_index.clone(),
                shard_index: settings.shard_index.clone(),
            };
            Arc::new(DynamoStore::connect(table).await)
        }
        None => {
            let store = MemoryStore::with_sample_books();
            if let Some(path) = &settings.seed_file {
                load_jsonl(&store, path).await?;
            }
            tracing::info!("Using in-memory store with {} books", store.len());
            Arc::new(store)
        }
    };

    tracing::info!("Storage backend: {}", store.name());

    // 2. HTTP Router:
    let fanout = settings.fanout_config();
    tracing::info!(
        "Fan-out shard timeout={:?} deadline={:?}",
        fanout.shard_timeout,
        fanout.deadline
    );
    let app = router(AppState::new(store, fanout));

    // 3. Start HTTP server:
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
