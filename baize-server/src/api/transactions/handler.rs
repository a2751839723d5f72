//! Transaction API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::db::models::TransactionWithLines;
use crate::db::repository::transaction::{self, TransactionAggregate, TransactionFilter};
use crate::utils::{AppError, AppResult, time};

/// Query params for the transaction listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub table_number: Option<i64>,
    /// `YYYY-MM-DD` or RFC 3339; start of day when date-only
    pub from: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339; inclusive through end of day when
    /// date-only
    pub to: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Listing response: page of transactions plus pagination metadata and
/// the aggregate totals of the full filtered set
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub items: Vec<TransactionWithLines>,
    pub pagination: Pagination,
    pub stats: TransactionAggregate,
}

/// GET /api/transactions - paginated history, newest first
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let filter = filter_from(&query)?;
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 200);

    let pool = &state.db.pool;
    let items = transaction::list(pool, &filter, page, page_size).await?;
    let total = transaction::count(pool, &filter).await?;
    let stats = transaction::aggregate(pool, &filter).await?;

    let total_pages = if total > 0 {
        (total as u64).div_ceil(page_size as u64) as i64
    } else {
        1
    };

    Ok(Json(TransactionListResponse {
        items,
        pagination: Pagination {
            total,
            page,
            page_size,
            total_pages,
        },
        stats,
    }))
}

fn filter_from(query: &ListQuery) -> Result<TransactionFilter, AppError> {
    let from = query
        .from
        .as_deref()
        .map(|s| {
            time::parse_range_start(s)
                .ok_or_else(|| AppError::Validation(format!("Invalid 'from' date: {s}")))
        })
        .transpose()?;
    let to = query
        .to
        .as_deref()
        .map(|s| {
            time::parse_range_end(s)
                .ok_or_else(|| AppError::Validation(format!("Invalid 'to' date: {s}")))
        })
        .transpose()?;

    Ok(TransactionFilter {
        table_number: query.table_number,
        from,
        to,
    })
}
