use server::{print_banner, Config};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner(env!("APP_VERSION"));

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    config.version = env!("APP_VERSION").to_string();

    tracing::info!(
        port = config.port,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        max_retries = config.max_retries,
        basic_auth = config.basic_auth.is_some(),
        allowed_hosts = config.allowed_hosts.len(),
        "Configuration loaded"
    );

    server::run_server(config).await
}
