use resume_registry::config::AppConfig;
use resume_registry::infrastructure::AppContainer;
use resume_registry::presentation::http::server::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let container = AppContainer::new(&config).await?;

    let server = HttpServer::new(
        container.registry_handler.clone(),
        container.background_processor.clone(),
        Some(config.port),
    );

    server.run().await
}
