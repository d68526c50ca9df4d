// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod metrics;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{MatchedPath, Request, State, rejection::JsonRejection},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use morra_common::{MAX_PLAYER_COUNT, RoundRecord, TurnRequest, TurnResponse, take_turn};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, info_span, warn};

use crate::metrics::Metrics;

#[derive(Clone)]
struct AppState {
    service_name: Arc<str>,
    metrics: Arc<Metrics>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let player_name = std::env::var("PLAYER_NAME")
        .ok()
        .unwrap_or_else(|| "rust_player".to_string());
    let service_name: Arc<str> = format!("{player_name}.bot").into();
    let tracer_provider = telemetry::init_telemetry(&service_name)?;

    let state = AppState {
        service_name,
        metrics: Arc::new(Metrics::new()?),
    };
    info!(service = %state.service_name, "starting player");

    let bind_addr = parse_bind_addr("PLAYER_SERVICE_BIND", "0.0.0.0:8889")?;
    let service_name = state.service_name.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(service = %service_name, %bind_addr, "player-service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = tracer_provider {
        if let Err(error) = provider.shutdown() {
            warn!(%error, "failed to flush spans on shutdown");
        }
    }
    info!(service = %service_name, "player-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}

fn build_router(state: AppState) -> Router {
    let span_service = state.service_name.clone();
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/turn", post(turn_handler))
        .route("/turn/", post(turn_handler))
        .route("/record", post(record_handler))
        .route("/record/", post(record_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
                info_span!(
                    "request",
                    service = %span_service,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

/// Path label for requests that hit the fallback, so arbitrary URIs share one series.
const UNMATCHED_PATH: &str = "unmatched";

async fn count_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let response = next.run(request).await;
    state
        .metrics
        .observe_request(method.as_str(), &path, response.status().as_u16());
    response
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": &*state.service_name}))
}

async fn ready() -> Json<bool> {
    debug!("ready check received");
    Json(true)
}

async fn turn_handler(
    State(state): State<AppState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Json<TurnResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    info!(
        game_id = %request.game_id,
        round_no = %request.round_no,
        player_count = ?request.player_count,
        "turn request received"
    );

    let player_count = validate_turn_request(&request)?;
    let response = take_turn(&mut rand::rng(), &request, player_count);
    state.metrics.observe_throw(response.throw_value);

    info!(
        game_id = %response.game_id,
        round_no = %response.round_no,
        throw = response.throw_value,
        call = response.call_value,
        "turn response sent"
    );
    Ok(Json(response))
}

fn validate_turn_request(request: &TurnRequest) -> Result<u32, ApiError> {
    let Some(player_count) = request.player_count else {
        return Err(ApiError::bad_request("reqplayercount is required"));
    };

    if player_count < 1 {
        return Err(ApiError::bad_request("reqplayercount must be at least 1"));
    }

    if player_count > MAX_PLAYER_COUNT {
        return Err(ApiError::bad_request(format!(
            "reqplayercount must be at most {MAX_PLAYER_COUNT}"
        )));
    }

    u32::try_from(player_count)
        .map_err(|_| ApiError::bad_request("reqplayercount is out of range"))
}

/// Round history is not kept; the record is logged and dropped.
async fn record_handler(body: Bytes) -> StatusCode {
    match serde_json::from_slice::<RoundRecord>(&body) {
        Ok(record) => debug!(
            game_id = %record.game_id,
            round_no = record.round_no,
            throw_total = record.throw_total(),
            winners = ?record.winners(),
            "round record received and discarded"
        ),
        Err(_) => debug!(bytes = body.len(), "unrecognised record payload discarded"),
    }
    StatusCode::OK
}

async fn metrics_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::internal(format!("failed to render metrics: {e}")))?;
    Ok(([(header::CONTENT_TYPE, metrics::CONTENT_TYPE)], body).into_response())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
