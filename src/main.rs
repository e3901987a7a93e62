use project_directory::{
    app, apply_migrations, directory_config, ensure_database_exists, resolve, AppState, EntityStore, MemoryStore,
    PgStore, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("project_directory=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = directory_config(&settings.schema);
    let model = resolve(&config)?;

    let store: Arc<dyn EntityStore> = match &settings.database_url {
        Some(url) => {
            ensure_database_exists(url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(url)
                .await?;
            apply_migrations(&pool, &config).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new(&model))
        }
    };

    let router = app(AppState::new(store, model), &settings);
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
