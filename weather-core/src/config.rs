use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::PathBuf, time::Duration};

use crate::model::Coordinates;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_TIMEZONE: &str = "Europe/Kyiv";
const DEFAULT_LANG: &str = "uk";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Optional, non-secret service settings stored on disk.
///
/// Example TOML:
/// ```toml
/// bind_addr = "127.0.0.1:8000"
/// database_path = "/var/lib/weather/weather.db"
/// timezone = "Europe/Kyiv"
/// units = "metric"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    /// IANA timezone used for the hourly schedule and for local timestamps.
    pub timezone: Option<String>,
    /// Locale passed to the upstream as `lang`.
    pub lang: Option<String>,
    /// Upstream `units` parameter; omitted from the request when unset.
    pub units: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    /// Load settings from disk, or return empty defaults if the file doesn't
    /// exist yet or there is no platform config directory to look in.
    pub fn load() -> Result<Self> {
        Self::load_or_default(Self::settings_file_path())
    }

    fn load_or_default(path: Result<PathBuf>) -> Result<Self> {
        let path = match path {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!("No settings location available, using defaults: {}", e);
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            // First run: no settings file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }

    /// Path to the settings file. `WEATHER_SETTINGS` takes precedence over the
    /// platform config directory.
    pub fn settings_file_path() -> Result<PathBuf> {
        if let Ok(explicit) = std::env::var("WEATHER_SETTINGS") {
            return Ok(PathBuf::from(explicit));
        }

        Ok(project_dirs()?.config_dir().join("settings.toml"))
    }

    /// Apply environment overrides through `lookup`.
    fn overlay(mut self, lookup: &impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = Some(addr);
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(tz) = lookup("SCHEDULE_TZ") {
            self.timezone = Some(tz);
        }
        self
    }
}

/// Immutable configuration built once at startup and shared by the scheduler,
/// pipeline and history service.
#[derive(Clone)]
pub struct ServiceConfig {
    pub city_name: String,
    pub coordinates: Coordinates,
    pub api_key: String,
    pub expected_token: String,
    pub timezone: Tz,
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub lang: String,
    pub units: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("city_name", &self.city_name)
            .field("coordinates", &self.coordinates)
            .field("api_key", &"<redacted>")
            .field("expected_token", &"<redacted>")
            .field("timezone", &self.timezone)
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("lang", &self.lang)
            .field("units", &self.units)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ServiceConfig {
    /// Read `.env`, the process environment and the settings file.
    ///
    /// Fails if any of `CITY_NAME`, `CITY_LAT`, `CITY_LON`, `API_KEY`,
    /// `EXPECTED_TOKEN` is absent or unparsable.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let settings = Settings::load()?;
        Self::from_lookup(|key| std::env::var(key).ok(), settings)
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        settings: Settings,
    ) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("Missing required environment variable: {key}"))
        };

        let city_name = required("CITY_NAME")?;
        let latitude = parse_degrees(&required("CITY_LAT")?, "CITY_LAT", 90.0)?;
        let longitude = parse_degrees(&required("CITY_LON")?, "CITY_LON", 180.0)?;
        let api_key = required("API_KEY")?;
        let expected_token = required("EXPECTED_TOKEN")?;

        let settings = settings.overlay(&lookup);

        let tz_name = settings.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE);
        let timezone = tz_name
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone '{tz_name}': {e}"))?;

        let bind_raw = settings.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address '{bind_raw}'"))?;

        let database_path = match settings.database_path {
            Some(path) => path,
            None => default_database_path(),
        };

        Ok(Self {
            city_name,
            coordinates: Coordinates { latitude, longitude },
            api_key,
            expected_token,
            timezone,
            bind_addr,
            database_path,
            lang: settings.lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            units: settings.units,
            request_timeout: Duration::from_secs(
                settings.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        })
    }
}

fn parse_degrees(raw: &str, key: &str, limit: f64) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a decimal number, got '{raw}'"))?;

    if !value.is_finite() || value.abs() > limit {
        return Err(anyhow!("{key} must be within ±{limit}, got {value}"));
    }
    Ok(value)
}

/// `<platform data dir>/weather.db`, or `./weather.db` when there is no home directory.
fn default_database_path() -> PathBuf {
    match project_dirs() {
        Ok(dirs) => dirs.data_dir().join("weather.db"),
        Err(e) => {
            tracing::warn!("{}; storing the database in the working directory", e);
            PathBuf::from("weather.db")
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-task", "weather-history")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CITY_NAME", "Kyiv"),
            ("CITY_LAT", "50.45"),
            ("CITY_LON", "30.52"),
            ("API_KEY", "KEY"),
            ("EXPECTED_TOKEN", "secret"),
            ("DATABASE_PATH", "/tmp/weather-test.db"),
        ]
    }

    #[test]
    fn builds_from_complete_environment() {
        let cfg = ServiceConfig::from_lookup(env(&full_env()), Settings::default())
            .expect("config must build");

        assert_eq!(cfg.city_name, "Kyiv");
        assert_eq!(
            cfg.coordinates,
            Coordinates {
                latitude: 50.45,
                longitude: 30.52,
            }
        );
        assert_eq!(cfg.timezone, chrono_tz::Europe::Kyiv);
        assert_eq!(cfg.bind_addr.port(), 8000);
        assert_eq!(cfg.lang, "uk");
        assert_eq!(cfg.units, None);
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/weather-test.db"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn each_required_variable_is_enforced() {
        for missing in ["CITY_NAME", "CITY_LAT", "CITY_LON", "API_KEY", "EXPECTED_TOKEN"] {
            let pairs: Vec<_> = full_env().into_iter().filter(|(k, _)| *k != missing).collect();
            let err = ServiceConfig::from_lookup(env(&pairs), Settings::default()).unwrap_err();
            assert!(
                err.to_string().contains(missing),
                "error for {missing} was: {err}"
            );
        }
    }

    #[test]
    fn blank_required_variable_counts_as_missing() {
        let mut pairs = full_env();
        pairs.retain(|(k, _)| *k != "API_KEY");
        pairs.push(("API_KEY", "  "));

        let err = ServiceConfig::from_lookup(env(&pairs), Settings::default()).unwrap_err();
        assert!(err.to_string().contains("Missing required environment variable: API_KEY"));
    }

    #[test]
    fn rejects_non_numeric_latitude() {
        let mut pairs = full_env();
        pairs.retain(|(k, _)| *k != "CITY_LAT");
        pairs.push(("CITY_LAT", "north"));

        let err = ServiceConfig::from_lookup(env(&pairs), Settings::default()).unwrap_err();
        assert!(err.to_string().contains("CITY_LAT must be a decimal number"));
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        let mut pairs = full_env();
        pairs.retain(|(k, _)| *k != "CITY_LON");
        pairs.push(("CITY_LON", "181"));

        let err = ServiceConfig::from_lookup(env(&pairs), Settings::default()).unwrap_err();
        assert!(err.to_string().contains("CITY_LON must be within"));
    }

    #[test]
    fn settings_file_values_apply_and_env_overrides_win() {
        let settings: Settings = toml::from_str(
            r#"
            bind_addr = "127.0.0.1:9000"
            timezone = "UTC"
            units = "metric"
            request_timeout_secs = 3
            "#,
        )
        .expect("valid toml");

        let mut pairs = full_env();
        pairs.push(("SCHEDULE_TZ", "Europe/Warsaw"));

        let cfg = ServiceConfig::from_lookup(env(&pairs), settings).expect("config must build");

        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.timezone, chrono_tz::Europe::Warsaw);
        assert_eq!(cfg.units.as_deref(), Some("metric"));
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn settings_default_when_no_config_directory() {
        let no_dir = Err(anyhow!("Could not determine platform config directory"));
        let settings =
            Settings::load_or_default(no_dir).expect("missing config directory is not fatal");

        assert!(settings.bind_addr.is_none());
        assert!(settings.timezone.is_none());

        let cfg =
            ServiceConfig::from_lookup(env(&full_env()), settings).expect("config must build");
        assert_eq!(cfg.city_name, "Kyiv");
    }

    #[test]
    fn settings_default_when_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(Ok(dir.path().join("settings.toml"))).unwrap();
        assert!(settings.units.is_none());
    }

    #[test]
    fn settings_file_is_read_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "units = \"imperial\"\nlang = \"en\"\n").unwrap();

        let settings = Settings::load_or_default(Ok(path)).unwrap();
        assert_eq!(settings.units.as_deref(), Some("imperial"));
        assert_eq!(settings.lang.as_deref(), Some("en"));
    }

    #[test]
    fn unparsable_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "bind_addr = [").unwrap();

        let err = Settings::load_or_default(Ok(path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn invalid_timezone_fails_fast() {
        let mut pairs = full_env();
        pairs.push(("SCHEDULE_TZ", "Mars/Olympus"));

        let err = ServiceConfig::from_lookup(env(&pairs), Settings::default()).unwrap_err();
        assert!(err.to_string().contains("Invalid timezone 'Mars/Olympus'"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = ServiceConfig::from_lookup(env(&full_env()), Settings::default()).unwrap();
        let dbg = format!("{cfg:?}");

        assert!(!dbg.contains("secret"));
        assert!(!dbg.contains("\"KEY\""));
        assert!(dbg.contains("<redacted>"));
    }
}
