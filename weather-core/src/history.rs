use std::sync::Arc;
use tracing::debug;

use crate::{
    config::ServiceConfig,
    error::QueryError,
    model::{HistoryEntry, HistoryResponse},
    store::{ObservationStore, TimeRange},
};

/// Answers "what did we record on this day?" for the configured city.
pub struct HistoryService {
    config: Arc<ServiceConfig>,
    store: Arc<dyn ObservationStore>,
}

impl HistoryService {
    pub fn new(config: Arc<ServiceConfig>, store: Arc<dyn ObservationStore>) -> Self {
        Self { config, store }
    }

    /// Exact, case-sensitive comparison against the configured token.
    pub fn authorize(&self, token: Option<&str>) -> Result<(), QueryError> {
        if token == Some(self.config.expected_token.as_str()) {
            Ok(())
        } else {
            Err(QueryError::Unauthorized)
        }
    }

    /// Look up all observations recorded on `day` (`YYYY-MM-DD`).
    ///
    /// The token is checked first, then the day format; neither failure
    /// touches the store. The day is echoed back verbatim.
    pub async fn get_history(
        &self,
        day: Option<&str>,
        token: Option<&str>,
    ) -> Result<HistoryResponse, QueryError> {
        self.authorize(token)?;

        let day =
            day.ok_or_else(|| QueryError::BadRequest("Missing query parameter: day".into()))?;
        if !is_day_pattern(day) {
            return Err(QueryError::BadRequest(format!(
                "day must match YYYY-MM-DD, got '{day}'"
            )));
        }

        let range = TimeRange::for_day(day);
        let store = Arc::clone(&self.store);
        let city = self.config.city_name.clone();
        let rows = tokio::task::spawn_blocking(move || store.range(&city, &range))
            .await
            .map_err(crate::error::StorageError::from)??;

        debug!(day, rows = rows.len(), "History query served");

        Ok(HistoryResponse {
            city: self.config.city_name.clone(),
            day: day.to_string(),
            data: rows.iter().map(HistoryEntry::from).collect(),
        })
    }
}

/// `^\d{4}-\d{2}-\d{2}$` with ASCII digits. Calendar validity is not checked.
pub fn is_day_pattern(day: &str) -> bool {
    let bytes = day.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
