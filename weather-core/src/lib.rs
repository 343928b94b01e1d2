//! Core library for the hourly weather history service.
//!
//! This crate defines:
//! - Configuration (environment secrets plus an optional settings file)
//! - The OpenWeather "current conditions" client
//! - SQLite storage of observations and day range scans
//! - The hourly scheduler and the fetch-and-store pipeline
//! - The token-gated history query
//!
//! It is used by `weather-server`, which adds the HTTP surface and process wiring.

pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod scheduler;
pub mod store;

pub use config::{ServiceConfig, Settings};
pub use error::{FetchError, QueryError, StorageError};
pub use history::HistoryService;
pub use model::{CurrentConditions, HistoryEntry, HistoryResponse, WeatherObservation};
pub use pipeline::{FetchAndStore, TickOutcome};
pub use provider::WeatherProvider;
pub use scheduler::HourlySchedule;
pub use store::{ObservationStore, SqliteStore};
