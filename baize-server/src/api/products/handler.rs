//! Product API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{Product, ProductCreate, ProductUpdate};
use crate::db::repository::product as product_repo;
use crate::utils::{AppError, AppResult};

/// Query params for listing products
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// When true, only active products are returned
    #[serde(default)]
    pub active: bool,
}

/// GET /api/products - list products, ordered by category then name
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Product>>> {
    let products = product_repo::find_all(&state.db.pool, query.active).await?;
    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    let product = product_repo::find_by_id(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product))
}

/// POST /api/products - create a product
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<Json<Product>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let product = product_repo::create(&state.db.write_pool, payload).await?;
    Ok(Json(product))
}

/// PUT /api/products/:id - partial update
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let product = product_repo::update(&state.db.write_pool, id, payload).await?;
    Ok(Json(product))
}

/// DELETE /api/products/:id - soft delete (deactivate)
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    let product = product_repo::soft_delete(&state.db.write_pool, id).await?;
    Ok(Json(product))
}
