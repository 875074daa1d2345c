use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{sse::{Event, Sse}, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use log::{error, info};
use serde_json::json;
use tokio::sync::{broadcast, watch};

use crate::algorithms::instance::ProblemInstance;
use crate::algorithms::optimizer::GeneticAlgorithm;
use crate::models::{GenerateRequest, GenerationStatus};
use crate::persistence::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub status_tx: broadcast::Sender<GenerationStatus>,
    pub stop_tx: watch::Sender<bool>,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (status_tx, _) = broadcast::channel(1024);
        let (stop_tx, _) = watch::channel(false);
        Self { status_tx, stop_tx, store }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate_handler))
        .route("/classes", get(classes_handler))
        .route("/status", get(status_handler))
        .route("/stop", post(stop_handler))
        .with_state(state)
}

pub async fn stop_handler(State(state): State<AppState>) -> Response {
    // Only runs subscribed before this point see the change.
    state.stop_tx.send_replace(true);
    Json(json!({ "success": true })).into_response()
}

pub async fn status_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + 'static> {
    let mut rx = state.status_tx.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(status) => match serde_json::to_string(&status) {
                    Ok(data) => yield Ok(Event::default().data(data).event("status")),
                    Err(e) => error!("Serialization error: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream)
}

pub async fn classes_handler(State(state): State<AppState>) -> Response {
    Json(json!({ "success": true, "data": state.store.list() })).into_response()
}

pub async fn generate_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, Response> {
    let instance = ProblemInstance::build(&req.problem).map_err(IntoResponse::into_response)?;
    let ga = GeneticAlgorithm::new(instance, req.parameters)
        .map_err(IntoResponse::into_response)?
        .with_status(state.status_tx.clone())
        .with_stop(state.stop_tx.subscribe());

    // The search is CPU bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || ga.run())
        .await
        .map_err(|e| {
            error!("Generation task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?;

    for session in &outcome.schedule {
        state.store.upsert(session);
    }
    info!("Persisted {} class sessions", outcome.schedule.len());

    Ok(Json(json!({
        "success": true,
        "fitness": outcome.fitness,
        "generations": outcome.generations,
        "schedule": outcome.schedule,
        "unassignable": outcome.unassignable,
        "unresolved": outcome.unresolved,
    }))
    .into_response())
}
