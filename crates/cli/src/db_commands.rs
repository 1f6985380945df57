use {cronkeeper_config::DatabaseConfig, cronkeeper_cron::SqliteStore, tracing::info};

/// Open the record store described by `config`, applying pending migrations.
pub async fn open_store(config: &DatabaseConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(&config.url, config.max_connections).await?;
    info!(url = %config.url, "database ready");
    Ok(store)
}

/// Run all pending database migrations and exit.
pub async fn migrate(config: &DatabaseConfig) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    store.pool().close().await;
    println!("Migrations applied to {}.", config.url);
    Ok(())
}
