//! HTTP surface: replay control, live SSE stream, analytics, ad-hoc
//! prediction and health.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::analytics::AnalyticsEngine;
use crate::broadcast::EventBus;
use crate::config::ReplayConfig;
use crate::domain::{Attribution, GameEvent, GameState};
use crate::error::{LivelineError, Result};
use crate::ml::{FeatureVector, ModelRegistry, WinProbModel};
use crate::providers::JsonlReplayProvider;
use crate::replay::ReplayManager;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ReplayManager>,
    pub bus: Arc<EventBus>,
    pub analytics: Arc<AnalyticsEngine>,
    pub registry: Arc<ModelRegistry>,
    pub replay_config: ReplayConfig,
    pub started_at: DateTime<Utc>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/replay/:game_id/start", post(start_replay))
        .route("/replay/:game_id/stop", post(stop_replay))
        .route("/stream/games/:game_id", get(stream_game))
        .route("/games/:game_id/analytics/momentum", get(momentum))
        .route("/games/:game_id/analytics/clutch", get(clutch))
        .route("/games/:game_id/analytics/decisions", get(decisions))
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for LivelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            LivelineError::ReplayConflict { .. } => StatusCode::CONFLICT,
            LivelineError::ReplayNotFound { .. }
            | LivelineError::GameNotFound(_)
            | LivelineError::Provider(_) => StatusCode::NOT_FOUND,
            LivelineError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            LivelineError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!("Request failed: {}", self);
        }
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Replay control
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StartReplayParams {
    /// JSONL filename inside the configured data directory
    source: String,
    /// The game_id value inside the source file to replay
    source_game_id: String,
    /// Plays per second
    speed: Option<f64>,
}

async fn start_replay(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(params): Query<StartReplayParams>,
) -> Result<impl IntoResponse> {
    // Prevent path traversal out of the data directory
    if params.source.contains("..") || params.source.contains(std::path::MAIN_SEPARATOR) {
        return Err(LivelineError::Validation(format!(
            "invalid source filename: {}",
            params.source
        )));
    }

    let speed = params.speed.unwrap_or(state.replay_config.plays_per_second);
    if !(0.1..=100.0).contains(&speed) {
        return Err(LivelineError::Validation(
            "speed must be between 0.1 and 100 plays per second".to_string(),
        ));
    }

    let path = std::path::Path::new(&state.replay_config.data_dir).join(&params.source);
    if !path.exists() {
        return Err(LivelineError::Provider(format!(
            "source not found: {}",
            params.source
        )));
    }

    let source_game_id = params.source_game_id.clone();
    let provider = tokio::task::spawn_blocking(move || {
        JsonlReplayProvider::load(&path, &source_game_id, speed)
    })
    .await
    .map_err(|e| LivelineError::Internal(format!("source load task failed: {e}")))??;

    state.manager.start(&game_id, Arc::new(provider)).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "started",
            "game_id": game_id,
            "source": params.source,
            "speed": speed,
        })),
    ))
}

async fn stop_replay(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.manager.stop(&game_id)?;
    Ok(Json(serde_json::json!({
        "status": "stopped",
        "game_id": game_id,
    })))
}

// ---------------------------------------------------------------------------
// Live stream
// ---------------------------------------------------------------------------

fn sse_event(event: &GameEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(e) => e,
        Err(_) => Event::default().comment("unserializable event"),
    }
}

/// SSE stream for one game: the cached latest event is delivered first so a
/// late joiner sees current state immediately, then live events as they
/// arrive. Idle periods produce keep-alive comments instead of errors.
async fn stream_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let snapshot = state.bus.latest(&game_id);
    let subscription = state.bus.subscribe(&game_id);

    let events = stream::unfold(
        (snapshot, subscription),
        |(snapshot, mut subscription)| async move {
            if let Some(event) = snapshot {
                return Some((Ok(sse_event(&event)), (None, subscription)));
            }
            let event = subscription.recv().await?;
            Some((Ok(sse_event(&event)), (None, subscription)))
        },
    );

    Sse::new(events).keep_alive(KeepAlive::new().interval(SSE_KEEP_ALIVE).text("heartbeat"))
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TopParam {
    top: Option<usize>,
}

async fn momentum(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(params): Query<TopParam>,
) -> Result<impl IntoResponse> {
    let report = state
        .analytics
        .momentum(&game_id, params.top.unwrap_or(3))
        .await?;
    Ok(Json(report))
}

async fn clutch(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(params): Query<TopParam>,
) -> Result<impl IntoResponse> {
    let report = state
        .analytics
        .clutch(&game_id, params.top.unwrap_or(5))
        .await?;
    Ok(Json(report))
}

async fn decisions(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(params): Query<TopParam>,
) -> Result<impl IntoResponse> {
    let report = state
        .analytics
        .decisions(&game_id, params.top.unwrap_or(10))
        .await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Ad-hoc prediction
// ---------------------------------------------------------------------------

/// Manual what-if probe. Nothing is persisted; the replay pipeline owns
/// durable predictions.
#[derive(Debug, Deserialize)]
struct PredictRequest {
    down: Option<i32>,
    yards_to_go: Option<i32>,
    yardline_100: Option<i32>,
    quarter: Option<i32>,
    quarter_seconds_remaining: Option<i32>,
    game_seconds_remaining: Option<i32>,
    half_seconds_remaining: Option<i32>,
    score_differential: Option<i32>,
    posteam_is_home: Option<bool>,
    posteam_timeouts_remaining: Option<i32>,
    defteam_timeouts_remaining: Option<i32>,
    spread_line: Option<f64>,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    home_wp: f64,
    away_wp: f64,
    model_version: String,
    top_attributions: Vec<Attribution>,
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<impl IntoResponse> {
    let model = state.registry.current()?;

    let score_differential = request.score_differential.unwrap_or(0);
    let game_state = GameState {
        game_id: "adhoc".to_string(),
        play_number: 0,
        sequence: 0,
        quarter: request.quarter.unwrap_or(1),
        quarter_seconds_remaining: request.quarter_seconds_remaining.unwrap_or(900),
        game_seconds_remaining: request.game_seconds_remaining.unwrap_or(3600),
        half_seconds_remaining: request.half_seconds_remaining.unwrap_or(1800),
        down: request.down,
        yards_to_go: request.yards_to_go,
        yardline_100: request.yardline_100,
        posteam_abbr: request.posteam_is_home.map(|_| "POS".to_string()),
        defteam_abbr: None,
        posteam_is_home: i32::from(request.posteam_is_home.unwrap_or(false)),
        receive_2h_ko: 0,
        posteam_timeouts_remaining: request.posteam_timeouts_remaining.unwrap_or(3),
        defteam_timeouts_remaining: request.defteam_timeouts_remaining.unwrap_or(3),
        score_home: score_differential.max(0),
        score_away: (-score_differential).max(0),
        score_differential,
        spread_line: request.spread_line,
        ep: None,
        play_type: None,
        description: None,
        raw_payload: serde_json::Map::new(),
    };

    let features = FeatureVector::from_state(&game_state);
    let home_wp = model.predict(&features);

    Ok(Json(PredictResponse {
        home_wp,
        away_wp: 1.0 - home_wp,
        model_version: model.version().to_string(),
        top_attributions: model.explain(&features, 5),
    }))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: i64,
    model_loaded: bool,
    active_replays: Vec<ActiveReplay>,
}

#[derive(Debug, Serialize)]
struct ActiveReplay {
    game_id: String,
    plays_processed: u64,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let model_loaded = state.registry.is_loaded();
    let active_replays = state
        .manager
        .active_sessions()
        .into_iter()
        .map(|(game_id, plays_processed)| ActiveReplay {
            game_id,
            plays_processed,
        })
        .collect();

    Json(HealthResponse {
        status: if model_loaded { "ok" } else { "degraded" },
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        model_loaded,
        active_replays,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::LogisticWinProbModel;
    use crate::persistence::{MemoryStore, RecordStore};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let registry = Arc::new(ModelRegistry::with_model(Arc::new(
            LogisticWinProbModel::default_untrained(),
        )));
        let bus = Arc::new(EventBus::with_defaults());
        AppState {
            manager: Arc::new(ReplayManager::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                Arc::clone(&bus),
                5,
            )),
            bus,
            analytics: Arc::new(AnalyticsEngine::new(store)),
            registry,
            replay_config: ReplayConfig::default(),
            started_at: Utc::now(),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_model_and_sessions() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model_loaded"], true);
    }

    #[tokio::test]
    async fn test_stop_unknown_replay_is_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::post("/replay/nope/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_rejects_path_traversal() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::post("/replay/g1/start?source=..%2Fetc%2Fpasswd&source_game_id=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_speed() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::post("/replay/g1/start?source=a.jsonl&source_game_id=x&speed=500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_start_missing_source_is_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::post("/replay/g1/start?source=missing.jsonl&source_game_id=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_analytics_unknown_game_is_404() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::get("/games/unknown/analytics/momentum")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_predict_returns_probabilities_without_persisting() {
        let app = router(test_state());
        let request = Request::post("/predict")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"down":3,"yards_to_go":7,"yardline_100":40,"quarter":4,
                    "game_seconds_remaining":300,"score_differential":3,
                    "posteam_is_home":true}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let home_wp = json["home_wp"].as_f64().unwrap();
        let away_wp = json["away_wp"].as_f64().unwrap();
        assert!((home_wp + away_wp - 1.0).abs() < 1e-9);
        assert!(home_wp > 0.5, "home leading late should be favored");
        assert_eq!(json["top_attributions"].as_array().unwrap().len(), 5);
    }
}
