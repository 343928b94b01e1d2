use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{
    error::FetchError,
    model::{Coordinates, CurrentConditions},
};

use super::WeatherProvider;

const ONECALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// OpenWeather One Call 3.0 client. Only the `current` block is consumed.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    http: Client,
    url: String,
    lang: String,
    units: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherBuilder {
    url: String,
    lang: String,
    units: Option<String>,
    timeout: Duration,
}

impl OpenWeatherProvider {
    pub fn builder() -> OpenWeatherBuilder {
        OpenWeatherBuilder {
            url: ONECALL_URL.to_string(),
            lang: "uk".to_string(),
            units: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl OpenWeatherBuilder {
    /// Point the client at another endpoint, e.g. a local mock server.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    pub fn units(mut self, units: Option<&str>) -> Self {
        self.units = units.map(str::to_string);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenWeatherProvider, FetchError> {
        let http = Client::builder().timeout(self.timeout).build()?;

        Ok(OpenWeatherProvider {
            http,
            url: self.url,
            lang: self.lang,
            units: self.units,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    dt: i64,
    temp: f64,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    current: OwCurrent,
}

impl From<OwCurrent> for CurrentConditions {
    fn from(current: OwCurrent) -> Self {
        let (condition_code, condition_description) = current
            .weather
            .into_iter()
            .next()
            .map(|w| (w.main, w.description))
            .unwrap_or_default();

        CurrentConditions {
            observed_at: current.dt,
            temperature: current.temp,
            condition_code,
            condition_description,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self, api_key), level = "debug")]
    async fn current_conditions(
        &self,
        location: Coordinates,
        api_key: &str,
    ) -> Result<CurrentConditions, FetchError> {
        let lat = location.latitude.to_string();
        let lon = location.longitude.to_string();

        let mut query = vec![
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("appid", api_key),
            ("lang", self.lang.as_str()),
        ];
        if let Some(units) = &self.units {
            query.push(("units", units.as_str()));
        }

        let res = self.http.get(&self.url).query(&query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status { status: status.as_u16(), body });
        }

        let parsed: OwOneCallResponse = serde_json::from_str(&body)?;
        Ok(parsed.current.into())
    }
}
