use crate::{
    config::ServiceConfig,
    error::FetchError,
    model::{Coordinates, CurrentConditions},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of "current conditions" for a fixed point.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_conditions(
        &self,
        location: Coordinates,
        api_key: &str,
    ) -> Result<CurrentConditions, FetchError>;
}

/// Construct the upstream provider from the service configuration.
pub fn provider_from_config(
    config: &ServiceConfig,
) -> Result<Box<dyn WeatherProvider>, FetchError> {
    let provider = OpenWeatherProvider::builder()
        .lang(&config.lang)
        .units(config.units.as_deref())
        .timeout(config.request_timeout)
        .build()?;

    Ok(Box::new(provider))
}
