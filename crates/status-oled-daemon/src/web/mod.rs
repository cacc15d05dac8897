//! HTTP API and live preview stream.

use axum::{
    extract::{Form, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::config::Settings;
use crate::printer::PrinterEvent;
use crate::state::{AppState, SampleQuery};

/// Creates the web router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Display image, or a settings sample with query parameters
        .route("/display.png", get(display_png))
        // Live preview frames
        .route("/events", get(events))
        // Host inputs
        .route("/status", post(status_set))
        .route("/gcode", post(gcode_post))
        .route("/progress", post(progress_set))
        .route("/event", post(event_post))
        .route("/clear", post(clear))
        // Settings
        .route("/settings", get(settings_get).post(settings_set))
        .route("/fonts", get(fonts))
        .route("/info", get(info))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn png_response(result: anyhow::Result<Vec<u8>>) -> Response {
    match result {
        Ok(png_data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            png_data,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to generate PNG: {}", e),
        )
            .into_response(),
    }
}

/// GET /display.png - Current frame or settings sample as PNG
async fn display_png(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SampleQuery>,
) -> Response {
    png_response(state.render_sample(&query))
}

/// GET /events - Preview frames as server-sent events
async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.subscribe_preview();
    let frames = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => return Some((Event::default().json_data(&frame), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Preview client lagged, skipped {} frames", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(frames).keep_alive(KeepAlive::default())
}

/// Form data for a status message.
#[derive(Deserialize)]
struct StatusForm {
    #[serde(default)]
    text: String,
}

/// POST /status - Show a status message (empty clears)
async fn status_set(
    State(state): State<Arc<AppState>>,
    Form(form): Form<StatusForm>,
) -> impl IntoResponse {
    state.show_status(&form.text);
    Json(state.lines())
}

/// Form data for a G-code line.
#[derive(Deserialize)]
struct GcodeForm {
    line: String,
}

/// POST /gcode - Feed a sent G-code line
async fn gcode_post(
    State(state): State<Arc<AppState>>,
    Form(form): Form<GcodeForm>,
) -> impl IntoResponse {
    let handled = state.handle_gcode(&form.line);
    Json(serde_json::json!({ "handled": handled }))
}

/// Form data for print progress.
#[derive(Deserialize)]
struct ProgressForm {
    progress: f32,
}

/// POST /progress - Set print progress in percent
async fn progress_set(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ProgressForm>,
) -> impl IntoResponse {
    state.set_progress(form.progress);
    Json(serde_json::json!({ "progress": state.progress() }))
}

/// Form data for a printer event.
#[derive(Deserialize)]
struct EventForm {
    event: String,
}

/// POST /event - Notify a printer lifecycle event
async fn event_post(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EventForm>,
) -> Response {
    match form.event.parse::<PrinterEvent>() {
        Ok(event) => {
            state.handle_event(event);
            StatusCode::OK.into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// POST /clear - Blank every display
async fn clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.clear_all_displays();
    StatusCode::OK
}

/// GET /settings - Runtime settings
async fn settings_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.settings())
}

/// POST /settings - Replace runtime settings
async fn settings_set(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Settings>,
) -> impl IntoResponse {
    state.apply_settings(settings);
    Json(state.settings())
}

/// GET /fonts - Available font files
async fn fonts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.fonts())
}

/// GET /info - Display facts
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.info())
}
