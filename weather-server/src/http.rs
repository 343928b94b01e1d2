use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};
use weather_core::{HistoryService, QueryError};

const TOKEN_HEADER: &str = "x-token";

pub fn router(history: Arc<HistoryService>) -> Router {
    Router::new().route("/history", get(get_history)).with_state(history)
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    day: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn get_history(
    State(history): State<Arc<HistoryService>>,
    headers: HeaderMap,
    query: Result<Query<HistoryParams>, QueryRejection>,
) -> Response {
    let token = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());

    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(%rejection, "Unparsable history query");
            // The token still decides first; a bad query is only reported to callers
            // that are allowed in.
            let err = match history.authorize(token) {
                Ok(()) => QueryError::BadRequest(rejection.body_text()),
                Err(err) => err,
            };
            return error_response(err);
        }
    };

    match history.get_history(params.day.as_deref(), token).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: QueryError) -> Response {
    if err.is_client_error() {
        warn!(error = %err, "Rejected history request");
    } else {
        error!(error = %err, "History query failed");
    }

    let status = match &err {
        QueryError::Unauthorized => StatusCode::UNAUTHORIZED,
        QueryError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match err {
        QueryError::BadRequest(reason) => reason,
        QueryError::Storage(_) => "Internal server error".to_string(),
        other => other.to_string(),
    };

    (status, Json(ErrorBody { error: message })).into_response()
}
