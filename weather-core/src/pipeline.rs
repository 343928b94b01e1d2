use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::ServiceConfig,
    error::StorageError,
    model::{WeatherObservation, format_timestamp},
    provider::WeatherProvider,
    store::ObservationStore,
};

/// Result of a single fetch-and-store tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The upstream answered and one row was written.
    Stored { id: i64, observation: WeatherObservation },
    /// The upstream failed; nothing was written for this tick.
    Skipped,
}

/// Fetches current conditions and appends them to the store.
pub struct FetchAndStore {
    config: Arc<ServiceConfig>,
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn ObservationStore>,
}

impl FetchAndStore {
    pub fn new(
        config: Arc<ServiceConfig>,
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn ObservationStore>,
    ) -> Self {
        Self { config, provider, store }
    }

    /// Run one tick. Upstream failures are logged and swallowed; storage
    /// failures are returned to the caller.
    pub async fn run(&self) -> Result<TickOutcome, StorageError> {
        let fetched = self
            .provider
            .current_conditions(self.config.coordinates, &self.config.api_key)
            .await
            .and_then(|conditions| {
                WeatherObservation::from_conditions(
                    &self.config.city_name,
                    conditions,
                    self.config.timezone,
                )
            });

        let observation = match fetched {
            Ok(observation) => observation,
            Err(err) => {
                warn!(city = %self.config.city_name, error = %err, "Fetch error, skipping tick");
                return Ok(TickOutcome::Skipped);
            }
        };

        let store = Arc::clone(&self.store);
        let to_insert = observation.clone();
        let id = tokio::task::spawn_blocking(move || store.insert(&to_insert)).await??;

        info!(
            id,
            city = %observation.city,
            timestamp = %format_timestamp(&observation.timestamp),
            temp = observation.temperature,
            weather = %observation.condition_code,
            "Stored weather observation"
        );

        Ok(TickOutcome::Stored { id, observation })
    }
}
