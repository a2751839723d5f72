//! Archived-history queries: date ranges, pagination, aggregation.

use baize_server::db::DbService;
use baize_server::db::models::{PaymentMethod, TransactionLine, TransactionRecord};
use baize_server::db::repository::transaction::{self, TransactionFilter};
use baize_server::utils::time::{parse_range_end, parse_range_start};

/// Millis for an RFC 3339 instant
fn at(s: &str) -> i64 {
    parse_range_start(s).unwrap()
}

fn record(
    id: i64,
    table_number: i64,
    total_due: f64,
    time_cost: f64,
    payment_method: PaymentMethod,
    session_end: i64,
    created_at: i64,
) -> TransactionRecord {
    TransactionRecord {
        id,
        table_number,
        table_id: table_number,
        session_start: session_end - 30 * 60_000,
        session_end,
        minutes_played: 30,
        hourly_rate: 6000.0,
        time_cost,
        consumption_total: total_due - time_cost,
        total_due,
        payment_method,
        notes: String::new(),
        closed_by: "system".to_string(),
        created_at,
    }
}

fn line(id: i64, transaction_id: i64, name: &str, quantity: i64, unit_price: f64) -> TransactionLine {
    TransactionLine {
        id,
        transaction_id,
        product_id: id,
        product_name: name.to_string(),
        quantity,
        unit_price,
        subtotal: unit_price * quantity as f64,
        recorded_at: 0,
    }
}

async fn seed(db: &DbService) {
    let records = vec![
        // Jan 15, morning, table 1
        record(1, 1, 100.0, 60.0, PaymentMethod::Cash, at("2026-01-15T10:30:00Z"), at("2026-01-15T10:30:00Z")),
        // Jan 15, last millisecond of the day, table 2
        record(2, 2, 200.0, 120.0, PaymentMethod::Card, at("2026-01-15T22:10:00Z"), parse_range_end("2026-01-15").unwrap()),
        // Jan 16, first millisecond of the day, table 2
        record(3, 2, 300.0, 180.0, PaymentMethod::Cash, at("2026-01-16T00:00:00Z"), at("2026-01-16T00:00:00Z")),
    ];

    let lines = vec![
        line(101, 1, "Cola", 3, 10.0),
        line(102, 2, "Cola", 1, 10.0),
        line(103, 2, "Nachos", 5, 14.0),
        line(104, 3, "Nachos", 2, 14.0),
    ];

    let mut conn = db.write_pool.acquire().await.unwrap();
    for r in &records {
        transaction::insert_record(&mut *conn, r).await.unwrap();
    }
    for l in &lines {
        transaction::insert_line(&mut *conn, l).await.unwrap();
    }
}

#[tokio::test]
async fn test_date_range_includes_end_of_day() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let filter = TransactionFilter {
        table_number: None,
        from: parse_range_start("2026-01-15"),
        to: parse_range_end("2026-01-15"),
    };

    let items = transaction::list(&db.pool, &filter, 1, 10).await.unwrap();
    let ids: Vec<i64> = items.iter().map(|t| t.record.id).collect();

    // Record 2 sits on 23:59:59.999 and must be included; record 3
    // opens the next day and must not
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn test_filter_by_table_number() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let filter = TransactionFilter {
        table_number: Some(2),
        from: None,
        to: None,
    };

    let items = transaction::list(&db.pool, &filter, 1, 10).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|t| t.record.table_number == 2));
}

#[tokio::test]
async fn test_listing_is_newest_first_and_paginated() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let filter = TransactionFilter::default();
    let total = transaction::count(&db.pool, &filter).await.unwrap();
    assert_eq!(total, 3);

    let first_page = transaction::list(&db.pool, &filter, 1, 2).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].record.id, 3);

    let second_page = transaction::list(&db.pool, &filter, 2, 2).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].record.id, 1);
}

#[tokio::test]
async fn test_aggregate_totals_match_manual_sums() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let agg = transaction::aggregate(&db.pool, &TransactionFilter::default())
        .await
        .unwrap();

    assert_eq!(agg.total_transactions, 3);
    assert_eq!(agg.total_sales, 600.0);
    assert_eq!(agg.average_sale, 200.0);
    assert_eq!(agg.min_sale, 100.0);
    assert_eq!(agg.max_sale, 300.0);
    assert_eq!(agg.total_time_cost, 360.0);
    assert_eq!(agg.total_consumption, 240.0);
}

#[tokio::test]
async fn test_aggregate_over_empty_set_is_all_zero() {
    let db = DbService::new_in_memory().await.unwrap();

    let agg = transaction::aggregate(&db.pool, &TransactionFilter::default())
        .await
        .unwrap();

    assert_eq!(agg.total_transactions, 0);
    assert_eq!(agg.total_sales, 0.0);
    assert_eq!(agg.average_sale, 0.0);
}

#[tokio::test]
async fn test_top_products_ranked_by_quantity_then_revenue() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let top = transaction::top_products(&db.pool, &TransactionFilter::default(), 10)
        .await
        .unwrap();

    // Nachos: 7 units / 98.0; Cola: 4 units / 40.0
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].product_name, "Nachos");
    assert_eq!(top[0].quantity_sold, 7);
    assert_eq!(top[0].revenue, 98.0);
    assert_eq!(top[1].product_name, "Cola");
    assert_eq!(top[1].quantity_sold, 4);
}

#[tokio::test]
async fn test_top_tables_ranked_by_revenue() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let top = transaction::top_tables(&db.pool, &TransactionFilter::default(), 10)
        .await
        .unwrap();

    // Table 2: 500.0 over two sessions; table 1: 100.0
    assert_eq!(top[0].table_number, 2);
    assert_eq!(top[0].revenue, 500.0);
    assert_eq!(top[0].transactions, 2);
    assert_eq!(top[1].table_number, 1);
}

#[tokio::test]
async fn test_revenue_by_hour_uses_session_end_and_omits_empty_hours() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let hourly = transaction::revenue_by_hour(&db.pool, &TransactionFilter::default())
        .await
        .unwrap();

    // Session ends at 10:30, 22:10 and 00:00 UTC
    let hours: Vec<i64> = hourly.iter().map(|h| h.hour).collect();
    assert_eq!(hours, vec![0, 10, 22]);
    let ten = hourly.iter().find(|h| h.hour == 10).unwrap();
    assert_eq!(ten.revenue, 100.0);
    assert_eq!(ten.transactions, 1);
}

#[tokio::test]
async fn test_revenue_by_payment_method() {
    let db = DbService::new_in_memory().await.unwrap();
    seed(&db).await;

    let breakdown =
        transaction::revenue_by_payment_method(&db.pool, &TransactionFilter::default())
            .await
            .unwrap();

    let cash = breakdown
        .iter()
        .find(|b| b.payment_method == PaymentMethod::Cash)
        .unwrap();
    assert_eq!(cash.revenue, 400.0);
    assert_eq!(cash.transactions, 2);

    let card = breakdown
        .iter()
        .find(|b| b.payment_method == PaymentMethod::Card)
        .unwrap();
    assert_eq!(card.revenue, 200.0);
    assert_eq!(card.transactions, 1);
}
