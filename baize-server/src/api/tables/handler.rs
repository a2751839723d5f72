//! Table API Handlers
//!
//! Thin layer over the repositories and the session manager: extract,
//! validate, delegate, map errors.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{
    BilliardTable, ConsumptionAdd, ConsumptionLine, TableClose, TableCreate, TableWithLedger,
};
use crate::db::repository::table as table_repo;
use crate::sessions::Bill;
use crate::utils::{AppError, AppResponse, AppResult, ok_with_message};

/// GET /api/tables - all tables, ordered by number
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<BilliardTable>>> {
    let tables = table_repo::find_all(&state.db.pool).await?;
    Ok(Json(tables))
}

/// GET /api/tables/:id - one table with its live ledger
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<TableWithLedger>> {
    let view = state.sessions.table_view(id).await?;
    Ok(Json(view))
}

/// POST /api/tables - create a table
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<TableCreate>,
) -> AppResult<Json<BilliardTable>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let table = table_repo::create(&state.db.write_pool, payload).await?;
    Ok(Json(table))
}

/// POST /api/tables/:id/open - start a session
pub async fn open(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<TableWithLedger>> {
    let view = state.sessions.open_table(id).await?;
    Ok(Json(view))
}

/// Close response: the freed table plus its computed bill
#[derive(Debug, Serialize)]
pub struct CloseTableResponse {
    #[serde(flatten)]
    pub table: TableWithLedger,
    pub bill: Bill,
}

/// POST /api/tables/:id/close - end a session and return the bill
pub async fn close(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<TableClose>,
) -> AppResult<Json<CloseTableResponse>> {
    let (table, bill) = state.sessions.close_table(id, payload).await?;
    Ok(Json(CloseTableResponse { table, bill }))
}

/// POST /api/tables/:id/consumptions - record a purchase
pub async fn add_consumption(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ConsumptionAdd>,
) -> AppResult<Json<AppResponse<TableWithLedger>>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let (view, message) = state.sessions.add_consumption(id, payload).await?;
    Ok(ok_with_message(view, message))
}

/// GET /api/tables/:id/consumptions - current ledger
pub async fn list_consumptions(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<ConsumptionLine>>> {
    let lines = state.sessions.list_consumptions(id).await?;
    Ok(Json(lines))
}
