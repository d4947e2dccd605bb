use axum::{debug_handler, extract::{rejection::JsonRejection, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{session::TOKEN, AppError, AppResult, AppState};

use super::{AuthResponse, SessionKeys};

#[derive(Deserialize)]
pub(crate) struct AuthRequest {
    action: String,
    email: String,
    password: String,
    username: Option<String>,
}

/// `register` answers 201, `login` 200. The token is also kept in the cookie session.
#[debug_handler(state = AppState)]
pub(crate) async fn auth(
    State(db_pool): State<SqlitePool>,
    State(keys): State<SessionKeys>,
    session: Session,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(AuthRequest { action, email, password, username }) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let (status, (token, user)) = match action.as_str() {
        "register" => {
            let username = username
                .filter(|username| !username.trim().is_empty())
                .ok_or("username is required")?;
            (
                StatusCode::CREATED,
                super::register(&db_pool, &keys, &email, &username, &password).await?,
            )
        }
        "login" => (
            StatusCode::OK,
            super::login(&db_pool, &keys, &email, &password).await?,
        ),
        _ => return Err(AppError::MethodNotAllowed),
    };

    session.insert(TOKEN, &token).await?;

    Ok((status, Json(AuthResponse { success: true, token, user })))
}
