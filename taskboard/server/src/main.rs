use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let config = taskboard_server::config::Config::from_env()?;
    tracing::info!("Starting taskboard with {:?}", config);
    taskboard_server::web::start_web_server(config).await
}
