use axum::{debug_handler, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{session::TOKEN, AppResult, AppState};

use super::{bearer_token, SessionKeys};

/// Forgets the cookie session. A still valid token also takes the user
/// offline; the token itself stays valid until it expires.
#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    State(db_pool): State<SqlitePool>,
    State(keys): State<SessionKeys>,
    headers: HeaderMap,
    session: Session,
) -> AppResult<Json<Value>> {
    let token = match bearer_token(&headers) {
        Some(token) => Some(token.to_owned()),
        None => session.get::<String>(TOKEN).await?,
    };

    if let Some(claims) = token.and_then(|token| keys.decode(&token).ok()) {
        super::go_offline(&db_pool, &claims.public_id).await?;
        info!(user = %claims.public_id, "logged out");
    }

    session.clear().await;
    Ok(Json(json!({ "success": true })))
}
