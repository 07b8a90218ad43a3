use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ax = roster_server::build().await?;

    let config = ax.app.config_snapshot();
    let addr = format!("{}:{}", config.http_host(), config.http_port());

    tracing::info!("[roster] listening on http://{addr}");

    ax.listen(addr).await?;

    Ok(())
}
