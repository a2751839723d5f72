//! Product Repository

use super::{RepoError, RepoResult};
use crate::db::models::{Product, ProductCreate, ProductUpdate};
use crate::utils::{id::snowflake_id, time::now_millis};
use sqlx::{SqliteConnection, SqlitePool};

const PRODUCT_SELECT: &str = "SELECT id, name, category, price, stock, image, is_active, \
     created_at, updated_at FROM product";

/// All products, optionally restricted to active ones
pub async fn find_all(pool: &SqlitePool, only_active: bool) -> RepoResult<Vec<Product>> {
    let sql = if only_active {
        format!("{PRODUCT_SELECT} WHERE is_active = 1 ORDER BY category, name")
    } else {
        format!("{PRODUCT_SELECT} ORDER BY category, name")
    };
    let products = sqlx::query_as::<_, Product>(&sql).fetch_all(pool).await?;
    Ok(products)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Product>> {
    let sql = format!("{PRODUCT_SELECT} WHERE id = ?");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(product)
}

/// Product read inside an open transaction
pub async fn find_by_id_conn(
    conn: &mut SqliteConnection,
    id: i64,
) -> RepoResult<Option<Product>> {
    let sql = format!("{PRODUCT_SELECT} WHERE id = ?");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Create a new product
pub async fn create(pool: &SqlitePool, data: ProductCreate) -> RepoResult<Product> {
    let id = snowflake_id();
    let now = now_millis();
    sqlx::query(
        "INSERT INTO product (id, name, category, price, stock, image, is_active, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
    )
    .bind(id)
    .bind(data.name)
    .bind(data.category)
    .bind(data.price)
    .bind(data.stock)
    .bind(data.image)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create product".into()))
}

/// Partial update
pub async fn update(pool: &SqlitePool, id: i64, data: ProductUpdate) -> RepoResult<Product> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE product SET name = COALESCE(?1, name), category = COALESCE(?2, category), \
         price = COALESCE(?3, price), stock = COALESCE(?4, stock), \
         image = COALESCE(?5, image), is_active = COALESCE(?6, is_active), updated_at = ?7 \
         WHERE id = ?8",
    )
    .bind(data.name)
    .bind(data.category)
    .bind(data.price)
    .bind(data.stock)
    .bind(data.image)
    .bind(data.is_active)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Product {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))
}

/// Soft delete: deactivate instead of removing, history still
/// references the product
pub async fn soft_delete(pool: &SqlitePool, id: i64) -> RepoResult<Product> {
    let now = now_millis();
    let rows = sqlx::query("UPDATE product SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Product {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))
}

/// Conditional stock decrement inside an open transaction.
///
/// Returns the affected row count: 0 means the product vanished or the
/// remaining stock is below `quantity`, so two concurrent sales can
/// never both succeed on the last unit.
pub async fn decrement_stock(
    conn: &mut SqliteConnection,
    id: i64,
    quantity: i64,
) -> RepoResult<u64> {
    let now = now_millis();
    let result = sqlx::query(
        "UPDATE product SET stock = stock - ?2, updated_at = ?3 \
         WHERE id = ?1 AND stock >= ?2",
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
