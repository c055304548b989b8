use super::encounters::{blocking, respond};
use crate::services::{SeatRequest, StartHandRequest, TableActionRequest, TableService};
use crate::store::StoredTable;
use crate::views::TableView;
use gambit_engine::table::ShowdownResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;

#[derive(Debug, Default, Deserialize)]
pub struct CreateTableRequest {
    #[serde(default)]
    pub table_id: Option<String>,
}

/// `?player=ID` shows that player's hole cards.
///
/// The server does not authenticate players. Whatever sits in front of it
/// must only forward a `player` that matches the caller's identity.
#[derive(Debug, Default, Deserialize)]
pub struct ViewerQuery {
    pub player: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TableResponse {
    pub table_id: String,
    pub version: i64,
    pub table: TableView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showdown: Option<ShowdownResult>,
}

impl TableResponse {
    fn new(stored: &StoredTable, viewer: Option<&str>) -> Self {
        Self {
            table_id: stored.table.table_id().to_string(),
            version: stored.version,
            table: TableView::for_viewer(&stored.table, viewer),
            showdown: None,
        }
    }
}

pub async fn create_table(tables: Arc<TableService>, request: CreateTableRequest) -> Response {
    let result = blocking(move || tables.create_table(request.table_id)).await;
    respond(
        StatusCode::CREATED,
        result.map(|stored| TableResponse::new(&stored, None)),
    )
}

pub async fn get_table(tables: Arc<TableService>, table_id: String, query: ViewerQuery) -> Response {
    let result = blocking(move || tables.get_table(&table_id)).await;
    respond(
        StatusCode::OK,
        result.map(|stored| TableResponse::new(&stored, query.player.as_deref())),
    )
}

pub async fn seat_player(tables: Arc<TableService>, table_id: String, request: SeatRequest) -> Response {
    let player_id = request.player_id.clone();
    let result = blocking(move || tables.seat_player(&table_id, request)).await;
    respond(
        StatusCode::OK,
        result.map(|stored| TableResponse::new(&stored, Some(&player_id))),
    )
}

pub async fn start_hand(
    tables: Arc<TableService>,
    table_id: String,
    request: StartHandRequest,
) -> Response {
    let result = blocking(move || tables.start_hand(&table_id, request.into())).await;
    respond(
        StatusCode::OK,
        result.map(|stored| TableResponse::new(&stored, None)),
    )
}

/// Applies one wagering action for `player_id`.
///
/// - **Method**: POST
/// - **Path**: `/api/tables/{table_id}/actions`
///
/// ```json
/// { "player_id": "p1", "action": { "raise": 60 } }
/// ```
///
/// `bet` and `raise` carry the target street total. When the action ends the
/// hand the response includes the showdown with payouts.
pub async fn act(tables: Arc<TableService>, table_id: String, request: TableActionRequest) -> Response {
    let TableActionRequest { player_id, action } = request;
    let actor = player_id.clone();
    let result = blocking(move || tables.act(&table_id, &actor, action)).await;
    respond(
        StatusCode::OK,
        result.map(|acted| TableResponse {
            showdown: acted.showdown,
            ..TableResponse::new(&acted.stored, Some(&player_id))
        }),
    )
}
