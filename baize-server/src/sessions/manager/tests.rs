use super::SessionManager;
use crate::db::DbService;
use crate::db::models::{
    BilliardTable, ConsumptionAdd, PaymentMethod, Product, ProductCreate, ProductUpdate,
    TableClose, TableCreate, TableStatus,
};
use crate::db::repository::{archive_queue, product as product_repo, table as table_repo,
    transaction as transaction_repo};
use crate::sessions::archive_worker::ArchiveWorker;
use crate::sessions::error::SessionError;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

async fn create_test_manager() -> (Arc<SessionManager>, SqlitePool) {
    let db = DbService::new_in_memory().await.unwrap();
    let (manager, _archive_rx) = SessionManager::new(&db, Duration::from_secs(5));
    (Arc::new(manager), db.pool)
}

async fn create_table(pool: &SqlitePool, number: i64, hourly_rate: f64) -> BilliardTable {
    table_repo::create(
        pool,
        TableCreate {
            number,
            hourly_rate,
        },
    )
    .await
    .unwrap()
}

async fn create_product(pool: &SqlitePool, name: &str, price: f64, stock: i64) -> Product {
    product_repo::create(
        pool,
        ProductCreate {
            name: name.to_string(),
            category: Default::default(),
            price,
            stock,
            image: None,
        },
    )
    .await
    .unwrap()
}

fn consume(product_id: i64, quantity: i64) -> ConsumptionAdd {
    ConsumptionAdd {
        product_id,
        quantity,
    }
}

// ========================================================================
// State machine
// ========================================================================

#[tokio::test]
async fn test_open_table() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;

    let view = manager.open_table(tbl.id).await.unwrap();

    assert_eq!(view.table.status, TableStatus::Occupied);
    assert!(view.table.session_start.is_some());
    assert!(view.consumption_lines.is_empty());
}

#[tokio::test]
async fn test_open_unknown_table_is_not_found() {
    let (manager, _pool) = create_test_manager().await;
    let err = manager.open_table(424242).await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn test_open_occupied_table_is_rejected() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;

    manager.open_table(tbl.id).await.unwrap();
    let err = manager.open_table(tbl.id).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
}

#[tokio::test]
async fn test_close_idle_table_is_rejected_not_silently_ignored() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;

    let err = manager
        .close_table(tbl.id, TableClose::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));

    // Re-closing after a real close is rejected the same way
    manager.open_table(tbl.id).await.unwrap();
    manager.close_table(tbl.id, TableClose::default()).await.unwrap();
    let err = manager
        .close_table(tbl.id, TableClose::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
}

#[tokio::test]
async fn test_occupied_iff_session_start() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 7, 3000.0).await;

    let idle = table_repo::find_by_id(&pool, tbl.id).await.unwrap().unwrap();
    assert_eq!(idle.status, TableStatus::Idle);
    assert!(idle.session_start.is_none());

    manager.open_table(tbl.id).await.unwrap();
    let occupied = table_repo::find_by_id(&pool, tbl.id).await.unwrap().unwrap();
    assert_eq!(occupied.status, TableStatus::Occupied);
    assert!(occupied.session_start.is_some());

    manager.close_table(tbl.id, TableClose::default()).await.unwrap();
    let closed = table_repo::find_by_id(&pool, tbl.id).await.unwrap().unwrap();
    assert_eq!(closed.status, TableStatus::Idle);
    assert!(closed.session_start.is_none());
}

#[tokio::test]
async fn test_open_clears_previous_ledger() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;
    let cola = create_product(&pool, "Cola", 250.0, 10).await;

    manager.open_table(tbl.id).await.unwrap();
    manager
        .add_consumption(tbl.id, consume(cola.id, 2))
        .await
        .unwrap();
    manager.close_table(tbl.id, TableClose::default()).await.unwrap();

    let view = manager.open_table(tbl.id).await.unwrap();
    assert!(view.consumption_lines.is_empty());
}

// ========================================================================
// Consumption recording
// ========================================================================

#[tokio::test]
async fn test_add_consumption_appends_line_and_decrements_stock() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 3, 6000.0).await;
    let beer = create_product(&pool, "Lager", 350.0, 12).await;

    manager.open_table(tbl.id).await.unwrap();
    let (view, message) = manager
        .add_consumption(tbl.id, consume(beer.id, 3))
        .await
        .unwrap();

    assert_eq!(view.consumption_lines.len(), 1);
    let line = &view.consumption_lines[0];
    assert_eq!(line.quantity, 3);
    assert_eq!(line.unit_price, 350.0);
    assert_eq!(line.subtotal, 1050.0);
    assert_eq!(line.product_name, "Lager");
    assert_eq!(message, "3x Lager added to table #3");

    let after = product_repo::find_by_id(&pool, beer.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 9);
}

#[tokio::test]
async fn test_add_consumption_requires_occupied_table() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;
    let cola = create_product(&pool, "Cola", 250.0, 10).await;

    let err = manager
        .add_consumption(tbl.id, consume(cola.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidState(_)));
}

#[tokio::test]
async fn test_add_consumption_unknown_product() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;

    manager.open_table(tbl.id).await.unwrap();
    let err = manager
        .add_consumption(tbl.id, consume(999_999, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn test_add_consumption_inactive_product_is_unavailable() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;
    let cola = create_product(&pool, "Cola", 250.0, 10).await;
    product_repo::soft_delete(&pool, cola.id).await.unwrap();

    manager.open_table(tbl.id).await.unwrap();
    let err = manager
        .add_consumption(tbl.id, consume(cola.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ProductUnavailable(_)));
}

#[tokio::test]
async fn test_insufficient_stock_reports_available_and_leaves_stock_unchanged() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;
    let snack = create_product(&pool, "Nachos", 500.0, 2).await;

    manager.open_table(tbl.id).await.unwrap();
    let err = manager
        .add_consumption(tbl.id, consume(snack.id, 5))
        .await
        .unwrap_err();

    match err {
        SessionError::InsufficientStock { available } => assert_eq!(available, 2),
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // No partial decrement, no ledger line
    let after = product_repo::find_by_id(&pool, snack.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 2);
    let lines = manager.list_consumptions(tbl.id).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_zero_quantity_is_rejected() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 1, 6000.0).await;
    let cola = create_product(&pool, "Cola", 250.0, 10).await;

    manager.open_table(tbl.id).await.unwrap();
    let err = manager
        .add_consumption(tbl.id, consume(cola.id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumption_never_oversells() {
    let (manager, pool) = create_test_manager().await;
    let beer = create_product(&pool, "Lager", 350.0, 8).await;

    // Four tables sell the same product concurrently, 2 units each:
    // stock is exactly 4 x 2, so all must succeed and stock must land
    // on zero with no lost update
    let mut tables = Vec::new();
    for n in 1..=4 {
        let tbl = create_table(&pool, n, 6000.0).await;
        manager.open_table(tbl.id).await.unwrap();
        tables.push(tbl);
    }

    let mut handles = Vec::new();
    for tbl in &tables {
        let manager = manager.clone();
        let table_id = tbl.id;
        let product_id = beer.id;
        handles.push(tokio::spawn(async move {
            manager.add_consumption(table_id, consume(product_id, 2)).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let after = product_repo::find_by_id(&pool, beer.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumption_on_last_unit_fails_exactly_once() {
    let (manager, pool) = create_test_manager().await;
    let snack = create_product(&pool, "Nachos", 500.0, 3).await;

    let t1 = create_table(&pool, 1, 6000.0).await;
    let t2 = create_table(&pool, 2, 6000.0).await;
    manager.open_table(t1.id).await.unwrap();
    manager.open_table(t2.id).await.unwrap();

    let a = {
        let manager = manager.clone();
        let id = t1.id;
        let pid = snack.id;
        tokio::spawn(async move { manager.add_consumption(id, consume(pid, 2)).await })
    };
    let b = {
        let manager = manager.clone();
        let id = t2.id;
        let pid = snack.id;
        tokio::spawn(async move { manager.add_consumption(id, consume(pid, 2)).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two competing sales may win");

    let after = product_repo::find_by_id(&pool, snack.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 1);
}

// ========================================================================
// Closing and archival
// ========================================================================

#[tokio::test]
async fn test_close_returns_bill_and_queues_archive() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 5, 6000.0).await;
    let cola = create_product(&pool, "Cola", 2000.0, 10).await;

    manager.open_table(tbl.id).await.unwrap();
    manager
        .add_consumption(tbl.id, consume(cola.id, 2))
        .await
        .unwrap();

    let (view, bill) = manager
        .close_table(
            tbl.id,
            TableClose {
                payment_method: Some(PaymentMethod::Card),
                notes: Some("birthday group".to_string()),
                closed_by: Some("ana".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(view.table.status, TableStatus::Idle);
    assert!(view.table.session_start.is_none());
    assert!(view.consumption_lines.is_empty());
    assert_eq!(bill.consumption_total, 4000.0);
    assert_eq!(bill.total_due, bill.time_cost + bill.consumption_total);

    // Snapshot is durably queued even before the worker runs
    let pending = archive_queue::pending(&pool).await.unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_worker_archives_closed_session() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 5, 6000.0).await;
    let cola = create_product(&pool, "Cola", 2000.0, 10).await;

    manager.open_table(tbl.id).await.unwrap();
    manager
        .add_consumption(tbl.id, consume(cola.id, 2))
        .await
        .unwrap();
    manager
        .close_table(
            tbl.id,
            TableClose {
                payment_method: Some(PaymentMethod::Transfer),
                notes: None,
                closed_by: None,
            },
        )
        .await
        .unwrap();

    let worker = ArchiveWorker::new(pool.clone());
    worker.process_pending_queue().await;

    let filter = transaction_repo::TransactionFilter::default();
    let records = transaction_repo::list(&pool, &filter, 1, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    let tx = &records[0];
    assert_eq!(tx.record.table_number, 5);
    assert_eq!(tx.record.payment_method, PaymentMethod::Transfer);
    assert_eq!(tx.record.closed_by, "system");
    assert_eq!(tx.record.consumption_total, 4000.0);
    assert_eq!(tx.consumption_lines.len(), 1);
    assert_eq!(tx.consumption_lines[0].product_name, "Cola");

    // Queue drained after success
    assert!(archive_queue::pending(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_succeeds_even_when_archive_fails() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 9, 6000.0).await;

    manager.open_table(tbl.id).await.unwrap();
    let (view, bill) = manager
        .close_table(tbl.id, TableClose::default())
        .await
        .unwrap();

    // The close already returned: table idle, bill in hand
    assert_eq!(view.table.status, TableStatus::Idle);
    assert!(bill.total_due >= 0.0);

    // Sabotage the queued snapshot so every archive attempt fails
    sqlx::query("UPDATE archive_queue SET payload = 'not json'")
        .execute(&pool)
        .await
        .unwrap();

    let worker = ArchiveWorker::new(pool.clone());
    worker.process_pending_queue().await;

    // Archive is dead-lettered, but the table state is untouched
    let after = table_repo::find_by_id(&pool, tbl.id).await.unwrap().unwrap();
    assert_eq!(after.status, TableStatus::Idle);
    assert!(after.session_start.is_none());
    assert!(archive_queue::pending(&pool).await.unwrap().is_empty());

    // Recovery at startup puts dead letters back in the queue
    let recovered = archive_queue::recover_failed(&pool).await.unwrap();
    assert_eq!(recovered, 1);
}

#[tokio::test]
async fn test_archived_history_is_independent_of_later_product_changes() {
    let (manager, pool) = create_test_manager().await;
    let tbl = create_table(&pool, 2, 6000.0).await;
    let cola = create_product(&pool, "Cola", 250.0, 10).await;

    manager.open_table(tbl.id).await.unwrap();
    manager
        .add_consumption(tbl.id, consume(cola.id, 1))
        .await
        .unwrap();
    manager.close_table(tbl.id, TableClose::default()).await.unwrap();

    ArchiveWorker::new(pool.clone()).process_pending_queue().await;

    // Rename and deactivate the product after the fact
    product_repo::update(
        &pool,
        cola.id,
        ProductUpdate {
            name: Some("Renamed".to_string()),
            price: Some(999.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    product_repo::soft_delete(&pool, cola.id).await.unwrap();

    let filter = transaction_repo::TransactionFilter::default();
    let records = transaction_repo::list(&pool, &filter, 1, 10).await.unwrap();
    let line = &records[0].consumption_lines[0];
    assert_eq!(line.product_name, "Cola");
    assert_eq!(line.unit_price, 250.0);
}
