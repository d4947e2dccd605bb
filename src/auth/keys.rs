use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::{Profile, User};

pub const TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Payload of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userID")]
    pub public_id: String,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User) -> Claims {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        Claims {
            user_id: user.id.clone(),
            public_id: user.public_id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            iat,
            exp: iat + TOKEN_LIFETIME.as_secs() as i64,
        }
    }

    pub fn profile(&self) -> Profile {
        Profile {
            id: self.user_id.clone(),
            public_id: self.public_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// HS256 keys for signing and checking session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> SessionKeys {
        SessionKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding)
    }

    /// Checks signature and expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
    }
}
