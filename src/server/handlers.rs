use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::directory::{self, CityDirectory};
use crate::engine::BatchReport;
use crate::posting::ExportRow;
use crate::types::{City, LaneInput};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── POST /api/lanes ─────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct LaneErrorBody {
    pub lane_index: usize,
    pub error: String,
}

#[derive(Serialize, Debug)]
pub struct LanesResponse {
    pub rows: Vec<ExportRow>,
    pub errors: Vec<LaneErrorBody>,
    pub report: BatchReport,
}

pub async fn process_lanes(
    State(state): State<Arc<AppState>>,
    Json(lanes): Json<Vec<LaneInput>>,
) -> Result<Json<LanesResponse>, ApiError> {
    let start = Instant::now();

    if lanes.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Request body must contain at least one lane"));
    }

    let result = state.engine.process_batch(lanes).await;
    let errors = result
        .errors()
        .map(|(lane_index, e)| LaneErrorBody {
            lane_index,
            error: e.to_string(),
        })
        .collect();
    let rows = result.rows().cloned().collect();

    info!(
        lanes = result.outcomes.len(),
        rows = result.report.total_rows,
        failed = result.report.lanes_failed,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POST /api/lanes"
    );

    Ok(Json(LanesResponse {
        rows,
        errors,
        report: result.report,
    }))
}

// ─── GET /api/cities ─────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct CityQuery {
    pub name: Option<String>,
    pub state: Option<String>,
}

/// Name lookup when `name` is given (requires `state`); otherwise the
/// directory listing, optionally filtered by state.
pub async fn city_lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityQuery>,
) -> Result<Json<Vec<City>>, ApiError> {
    let name = params.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let st = params.state.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let cities = match (name, st) {
        (Some(name), Some(st)) => {
            let engine = &state.engine;
            let query = engine.directory().find_by_normalized_name(name, st);
            directory::with_timeout(engine.config().directory_timeout(), query)
                .await
                .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?
        }
        (Some(_), None) => {
            return Err(api_error(StatusCode::BAD_REQUEST, "'name' requires a 'state' parameter"));
        }
        (None, st) => state
            .engine
            .directory()
            .cities()
            .iter()
            .filter(|c| st.map_or(true, |s| c.state_code.eq_ignore_ascii_case(s)))
            .cloned()
            .collect(),
    };

    info!(name = name.unwrap_or(""), state = st.unwrap_or(""), found = cities.len(), "GET /api/cities");
    Ok(Json(cities))
}

// ─── GET /api/health ─────────────────────────────────────────────

#[derive(Serialize, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cities: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cities: state.engine.directory().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::directory::InMemoryDirectory;
    use crate::engine::LaneEngine;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            engine: LaneEngine::new(Arc::new(InMemoryDirectory::builtin()), EngineConfig::default()),
        })
    }

    fn lane(origin: &str, dest: Option<&str>) -> LaneInput {
        LaneInput {
            origin_city: Some(origin.into()),
            origin_state: Some("IL".into()),
            dest_city: dest.map(str::to_string),
            dest_state: Some("TX".into()),
            prefer_fill_target: true,
            ..LaneInput::default()
        }
    }

    #[tokio::test]
    async fn test_process_lanes() {
        let body = vec![lane("Chicago", Some("Dallas")), lane("Joliet", None)];
        let Json(resp) = process_lanes(State(app_state()), Json(body)).await.ok().unwrap();
        assert_eq!(resp.rows.len(), 12);
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(resp.errors[0].lane_index, 1);
        assert_eq!(resp.report.lanes_ok, 1);
    }

    #[tokio::test]
    async fn test_process_lanes_empty_body() {
        let err = process_lanes(State(app_state()), Json(vec![])).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_city_lookup_by_name() {
        let params = CityQuery {
            name: Some("ft wayne".into()),
            state: Some("in".into()),
        };
        let Json(cities) = city_lookup(State(app_state()), Query(params)).await.ok().unwrap();
        assert_eq!(cities[0].name, "Fort Wayne");
    }

    #[tokio::test]
    async fn test_city_lookup_requires_state() {
        let params = CityQuery {
            name: Some("Chicago".into()),
            state: None,
        };
        let err = city_lookup(State(app_state()), Query(params)).await.err().unwrap();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_city_listing_by_state() {
        let params = CityQuery {
            name: None,
            state: Some("TX".into()),
        };
        let Json(cities) = city_lookup(State(app_state()), Query(params)).await.ok().unwrap();
        assert!(!cities.is_empty());
        assert!(cities.iter().all(|c| c.state_code == "TX"));
    }

    #[tokio::test]
    async fn test_health() {
        let Json(h) = health(State(app_state())).await;
        assert_eq!(h.status, "ok");
        assert_eq!(h.cities, InMemoryDirectory::builtin().len());
    }
}
