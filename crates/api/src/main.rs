use api::{build_app, init_app_state, init_auth_state};
use config::{ApiConfig, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {e}");
        }
    }

    // Load configuration first to get logging settings
    let config = ApiConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Application cannot start without a valid configuration.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let app_state = init_app_state(&config)?;
    let auth_state = init_auth_state(&config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialise authentication");
        std::process::exit(1);
    });

    let app = build_app(app_state, auth_state);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!(
        "Authentication: {}",
        if config.auth.is_enabled() { "ENABLED" } else { "DISABLED" }
    );
    tracing::info!(letta = %config.agents.base_url, static_dir = %config.webapp.static_dir.display(), "Serving chat API");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) {
    let filter = logging_config.filter_directive();

    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
