use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use weather_core::{
    FetchAndStore, HistoryService, HourlySchedule, ObservationStore, ServiceConfig, Settings,
    SqliteStore, TickOutcome, WeatherProvider, provider::provider_from_config, scheduler,
};

use crate::http;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-server", version, about = "Hourly weather recorder with a history API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record the weather every hour and serve `GET /history` (default).
    Serve,

    /// Fetch and store the current weather once, right now.
    Fetch,

    /// Print the stored history for a day as JSON.
    History {
        /// Day in YYYY-MM-DD form.
        #[arg(long)]
        day: String,
    },

    /// Print where the optional settings file is read from.
    SettingsPath,
}

/// Everything a running service needs, built once from the configuration.
struct Services {
    config: Arc<ServiceConfig>,
    store: Arc<dyn ObservationStore>,
}

impl Services {
    fn init() -> anyhow::Result<Self> {
        let config = Arc::new(ServiceConfig::from_env()?);
        info!(?config, "Configuration loaded");

        let store = SqliteStore::open(&config.database_path).with_context(|| {
            format!("Failed to open database: {}", config.database_path.display())
        })?;

        Ok(Self { config, store: Arc::new(store) })
    }

    fn pipeline(&self) -> anyhow::Result<FetchAndStore> {
        let provider: Arc<dyn WeatherProvider> = provider_from_config(&self.config)
            .context("Failed to build upstream client")?
            .into();

        Ok(FetchAndStore::new(self.config.clone(), provider, self.store.clone()))
    }

    fn history(&self) -> HistoryService {
        HistoryService::new(self.config.clone(), self.store.clone())
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Serve) {
            Command::Serve => serve(Services::init()?).await,
            Command::Fetch => {
                let services = Services::init()?;
                match services.pipeline()?.run().await? {
                    TickOutcome::Stored { id, .. } => println!("Stored observation #{id}"),
                    TickOutcome::Skipped => println!("Upstream fetch failed; nothing stored"),
                }
                Ok(())
            }
            Command::History { day } => {
                let services = Services::init()?;
                let token = services.config.expected_token.clone();
                let response = services
                    .history()
                    .get_history(Some(day.as_str()), Some(token.as_str()))
                    .await?;
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            }
            Command::SettingsPath => {
                println!("{}", Settings::settings_file_path()?.display());
                Ok(())
            }
        }
    }
}

async fn serve(services: Services) -> anyhow::Result<()> {
    let pipeline = Arc::new(services.pipeline()?);
    let schedule = HourlySchedule::new(services.config.timezone);
    let recorder = scheduler::spawn_hourly(schedule, move || {
        let pipeline = pipeline.clone();
        async move { pipeline.run().await.map(|_| ()) }
    });

    let app = http::router(Arc::new(services.history()));
    let listener = tokio::net::TcpListener::bind(services.config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", services.config.bind_addr))?;
    info!(addr = %services.config.bind_addr, city = %services.config.city_name, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    recorder.abort();
    Ok(())
}
