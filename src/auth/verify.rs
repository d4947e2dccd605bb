use axum::{
    debug_handler,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    Json,
};
use tower_sessions::Session;
use tracing::debug;

use crate::{session::TOKEN, AppError, AppState};

use super::{Claims, SessionKeys, VerifyResponse};

/// Claims of a verified session token, taken from `Authorization: Bearer ..`
/// or, failing that, from the cookie session.
pub struct Bearer(pub Claims);

/// The second word of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .split(' ')
        .nth(1)
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for Bearer
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => token.to_owned(),
            None => {
                let Ok(session) = Session::from_request_parts(parts, state).await else {
                    return Err(AppError::Unauthorized);
                };
                session.get::<String>(TOKEN).await?.ok_or(AppError::Unauthorized)?
            }
        };

        let keys = SessionKeys::from_ref(state);
        match keys.decode(&token) {
            Ok(claims) => Ok(Bearer(claims)),
            Err(err) => {
                debug!(error = %err, "rejected session token");
                Err(AppError::Forbidden)
            }
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn verify(Bearer(claims): Bearer) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        success: true,
        user: claims.profile(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Some("Bearer abc.def.ghi"), Some("abc.def.ghi"))]
    #[case(Some("Token abc"), Some("abc"))]
    #[case(Some("Bearer"), None)]
    #[case(Some("Bearer "), None)]
    #[case(None, None)]
    fn token_is_second_word(#[case] header: Option<&str>, #[case] expected: Option<&str>) {
        let mut headers = HeaderMap::new();
        if let Some(header) = header {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(header).unwrap());
        }
        assert_eq!(bearer_token(&headers), expected);
    }
}
