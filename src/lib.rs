pub mod auth;
pub mod challenges;
pub mod client;
pub mod config;
pub mod dare;
pub mod db;
pub mod matching;
pub mod rooms;
pub mod rtc;
pub mod session;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::{error, warn};

use crate::{auth::SessionKeys, config::Config, rtc::TokenBuilder};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub keys: SessionKeys,
    pub tokens: TokenBuilder,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> AppState {
        if config.jwt_secret == config::DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET not set, signing session tokens with the default secret");
        }
        if config.agora.is_none() {
            warn!("AGORA_APP_ID/AGORA_APP_CERT not set, transport tokens will be empty");
        }

        AppState {
            db_pool,
            keys: SessionKeys::new(config.jwt_secret.as_bytes()),
            tokens: TokenBuilder::from_config(config.agora.as_ref()),
        }
    }
}

/// Every HTTP route of the service, with the cookie session and CORS layers applied.
pub fn app(app_state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(7)));

    Router::new()
        .merge(auth::router())
        .merge(matching::router())
        .merge(rooms::router())
        .merge(challenges::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("User already exists")]
    Conflict,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Access token required")]
    Unauthorized,
    #[error("Invalid token")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Conflict | InvalidCredentials | BadRequest(_) => StatusCode::BAD_REQUEST,
            Unauthorized => StatusCode::UNAUTHORIZED,
            Forbidden => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(err) => {
                error!(error = ?err, "request failed");
                "Internal server error".to_owned()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::BadRequest(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::BadRequest(err.to_owned())
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(bcrypt::BcryptError);
apperr_impl!(jsonwebtoken::errors::Error);
apperr_impl!(tokio::task::JoinError);
apperr_impl!(rtc::TokenError);
