use crate::errors::IntoErrorResponse;
use crate::services::{CombatService, RoundAction, ServiceError, StartEncounter};
use crate::store::StoredRound;
use crate::views::RoundView;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Serialize)]
pub struct EncounterResponse {
    pub encounter_id: String,
    pub opponent: String,
    pub version: i64,
    pub round: RoundView,
}

impl From<StoredRound> for EncounterResponse {
    fn from(stored: StoredRound) -> Self {
        Self {
            encounter_id: stored.round.encounter_id.clone(),
            opponent: stored.opponent,
            version: stored.version,
            round: RoundView::from(&stored.round),
        }
    }
}

/// Starts an encounter and deals its first round.
///
/// - **Method**: POST
/// - **Path**: `/api/encounters`
///
/// ```json
/// { "character_id": "hero", "player_hp": 100, "opponent_hp": 80, "opponent": "hard" }
/// ```
///
/// Responds 201 with the encounter and its round in the hold phase.
pub async fn start_encounter(combat: Arc<CombatService>, request: StartEncounter) -> Response {
    let result = blocking(move || combat.start_encounter(request, Utc::now())).await;
    respond(StatusCode::CREATED, result.map(EncounterResponse::from))
}

pub async fn get_encounter(combat: Arc<CombatService>, encounter_id: String) -> Response {
    let result = blocking(move || combat.get_round(&encounter_id)).await;
    respond(StatusCode::OK, result.map(EncounterResponse::from))
}

/// Applies one hold-phase action.
///
/// - **Method**: POST
/// - **Path**: `/api/encounters/{encounter_id}/actions`
///
/// Body is one of `{"action":"toggle_hold","index":2}`, `{"action":"use_peek"}`,
/// `{"action":"use_reroll"}` or `{"action":"confirm_hold"}`. A second confirm
/// answers 409 `already_resolved`; re-fetch the encounter instead of retrying.
pub async fn submit_action(
    combat: Arc<CombatService>,
    encounter_id: String,
    action: RoundAction,
) -> Response {
    let result = blocking(move || combat.apply(&encounter_id, action, Utc::now())).await;
    respond(StatusCode::OK, result.map(EncounterResponse::from))
}

/// Deals the next round of a resolved encounter (`POST /api/encounters/{id}/rounds`).
pub async fn next_round(combat: Arc<CombatService>, encounter_id: String) -> Response {
    let result = blocking(move || combat.start_next_round(&encounter_id, Utc::now())).await;
    respond(StatusCode::CREATED, result.map(EncounterResponse::from))
}

/// Archives the final round and returns the encounter history (`DELETE /api/encounters/{id}`).
pub async fn finish_encounter(combat: Arc<CombatService>, encounter_id: String) -> Response {
    let result = blocking(move || combat.finish_encounter(&encounter_id)).await;
    respond(StatusCode::OK, result)
}

/// Runs a store-backed service call on tokio's blocking pool.
///
/// Store calls hold a connection mutex and may wait out SQLite's busy timeout,
/// so they never run on the async workers.
pub(crate) async fn blocking<T, F>(call: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(error = %err, "service worker failed");
            Err(ServiceError::Worker(err.to_string()))
        }
    }
}

pub(crate) fn respond<T: Serialize>(status: StatusCode, result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(body) => reply::with_status(reply::json(&body), status).into_response(),
        Err(err) => err.into_http_response(),
    }
}
