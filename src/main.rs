use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use keyvend::config::Config;
use keyvend::db::{AppState, create_pool, init_db};

#[derive(Parser)]
#[command(name = "keyvend", version, about = "License key vending and reseller commissions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the schema and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyvend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().map_err(anyhow::Error::msg)?;

    let pool = create_pool(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    {
        let conn = pool.get()?;
        init_db(&conn).context("Failed to initialize schema")?;
    }

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Migrate => {
            tracing::info!("Schema ready at {}", config.database_path);
            Ok(())
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if config.dev_mode {
                tracing::warn!("Running in dev mode with default secrets");
            }

            let state = AppState::from_config(pool, &config);
            state
                .limiter
                .clone()
                .spawn_sweeper(Duration::from_secs(config.login_sweep_minutes.max(1) * 60));

            let app = keyvend::app(state);
            let addr = config.addr();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            tracing::info!("keyvend listening on {}", addr);
            axum::serve(listener, app).await?;
            Ok(())
        }
    }
}
