//! Statistics API Handlers
//!
//! Read-only rollups over archived transactions. Queries never touch
//! live table state and take no table locks.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::db::repository::transaction::{
    self, HourlyRevenue, PaymentBreakdown, TopProduct, TopTable, TransactionAggregate,
    TransactionFilter,
};
use crate::utils::{AppError, AppResult, time};

/// Ranked lists are capped at the top ten entries
const TOP_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    /// `day` (default), `week` or `month`; ignored when an explicit
    /// range is given
    #[serde(default = "default_period")]
    pub period: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn default_period() -> String {
    "day".to_string()
}

/// Full statistics bundle
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub period: String,
    /// Resolved window start (epoch millis)
    pub period_start: i64,
    /// Resolved window end (epoch millis)
    pub period_end: i64,
    pub totals: TransactionAggregate,
    pub top_products: Vec<TopProduct>,
    pub top_tables: Vec<TopTable>,
    /// Revenue per UTC hour of session end; hours with no revenue are
    /// omitted
    pub revenue_by_hour: Vec<HourlyRevenue>,
    pub payment_methods: Vec<PaymentBreakdown>,
}

/// GET /api/statistics - aggregate reporting for a time window
pub async fn get_statistics(
    State(state): State<ServerState>,
    Query(query): Query<StatisticsQuery>,
) -> AppResult<Json<StatisticsResponse>> {
    let now = time::now_millis();
    let (period, start, end) = resolve_window(&query, now)?;

    let filter = TransactionFilter {
        table_number: None,
        from: Some(start),
        to: Some(end),
    };

    tracing::debug!(period = %period, start, end, "Computing statistics");

    let pool = &state.db.pool;
    let totals = transaction::aggregate(pool, &filter).await?;
    let top_products = transaction::top_products(pool, &filter, TOP_LIMIT).await?;
    let top_tables = transaction::top_tables(pool, &filter, TOP_LIMIT).await?;
    let revenue_by_hour = transaction::revenue_by_hour(pool, &filter).await?;
    let payment_methods = transaction::revenue_by_payment_method(pool, &filter).await?;

    Ok(Json(StatisticsResponse {
        period,
        period_start: start,
        period_end: end,
        totals,
        top_products,
        top_tables,
        revenue_by_hour,
        payment_methods,
    }))
}

/// Resolve the query into a `[start, end]` window: an explicit range
/// wins, otherwise the named period ending now
fn resolve_window(query: &StatisticsQuery, now: i64) -> Result<(String, i64, i64), AppError> {
    if let (Some(from), Some(to)) = (query.from.as_deref(), query.to.as_deref()) {
        let start = time::parse_range_start(from)
            .ok_or_else(|| AppError::Validation(format!("Invalid 'from' date: {from}")))?;
        let end = time::parse_range_end(to)
            .ok_or_else(|| AppError::Validation(format!("Invalid 'to' date: {to}")))?;
        if end < start {
            return Err(AppError::Validation(
                "'to' date must not precede 'from' date".to_string(),
            ));
        }
        return Ok(("custom".to_string(), start, end));
    }

    let start = time::period_start_millis(&query.period, now);
    Ok((query.period.clone(), start, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_range_wins_over_period() {
        let query = StatisticsQuery {
            period: "week".to_string(),
            from: Some("2026-01-01".to_string()),
            to: Some("2026-01-31".to_string()),
        };
        let (period, start, end) = resolve_window(&query, 1_800_000_000_000).unwrap();
        assert_eq!(period, "custom");
        assert!(start < end);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let query = StatisticsQuery {
            period: "day".to_string(),
            from: Some("2026-02-01".to_string()),
            to: Some("2026-01-01".to_string()),
        };
        assert!(resolve_window(&query, 1_800_000_000_000).is_err());
    }

    #[test]
    fn test_named_period_ends_now() {
        let query = StatisticsQuery {
            period: "week".to_string(),
            from: None,
            to: None,
        };
        let now = 1_800_000_000_000;
        let (period, start, end) = resolve_window(&query, now).unwrap();
        assert_eq!(period, "week");
        assert_eq!(end, now);
        assert_eq!(now - start, 7 * 86_400_000);
    }
}
