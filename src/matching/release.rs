use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::info;

use crate::{auth::Bearer, AppResult, AppState};

/// Stops searching and breaks the current match, on both sides.
/// Returns whether a partner was let go.
pub async fn release(db_pool: &SqlitePool, public_id: &str) -> AppResult<bool> {
    let mut tx = db_pool.begin().await?;

    let partner = sqlx::query("UPDATE users SET current_match = NULL WHERE current_match = ?")
        .bind(public_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET current_match = NULL, searching = 0 WHERE public_id = ?")
        .bind(public_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(partner.rows_affected() > 0)
}

#[debug_handler(state = AppState)]
pub(crate) async fn release_match(
    State(db_pool): State<SqlitePool>,
    Bearer(claims): Bearer,
) -> AppResult<Json<Value>> {
    let released = release(&db_pool, &claims.public_id).await?;
    info!(user = %claims.public_id, released, "left matchmaking");

    Ok(Json(json!({ "success": true, "message": "Stopped searching" })))
}
