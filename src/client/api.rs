use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    auth::{AuthResponse, VerifyResponse},
    challenges::{Challenge, ChallengeList},
    db::Profile,
    matching::MatchResponse,
    rooms::{CreateRoomResponse, FindRoomsResponse, ReopenRoomResponse, RoomView},
};

use super::{ClientError, ClientResult};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the service. Keeps the session token of the last
/// successful `register`/`login` and sends it as a bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ApiClient {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> ApiClient {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    fn authed(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::SignedOut)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    pub async fn register(&mut self, email: &str, username: &str, password: &str) -> ClientResult<Profile> {
        let body = json!({ "action": "register", "email": email, "username": username, "password": password });
        self.authenticate(body).await
    }

    /// `identifier` is the email or the username.
    pub async fn login(&mut self, identifier: &str, password: &str) -> ClientResult<Profile> {
        let body = json!({ "action": "login", "email": identifier, "password": password });
        self.authenticate(body).await
    }

    async fn authenticate(&mut self, body: serde_json::Value) -> ClientResult<Profile> {
        let response = self.request(Method::POST, "/api/auth").json(&body).send().await?;
        let AuthResponse { token, user, .. } = decode(response).await?;
        self.token = Some(token);
        Ok(user)
    }

    pub async fn verify(&self) -> ClientResult<Profile> {
        let response = self.authed(Method::GET, "/api/auth/verify")?.send().await?;
        let VerifyResponse { user, .. } = decode(response).await?;
        Ok(user)
    }

    /// Takes the user offline and forgets the token.
    pub async fn logout(&mut self) -> ClientResult<()> {
        let response = self.authed(Method::POST, "/api/auth/logout")?.send().await?;
        decode::<serde_json::Value>(response).await?;
        self.token = None;
        Ok(())
    }

    pub async fn request_match(&self) -> ClientResult<MatchResponse> {
        let response = self.authed(Method::POST, "/api/match")?.send().await?;
        decode(response).await
    }

    pub async fn release_match(&self) -> ClientResult<()> {
        let response = self.authed(Method::DELETE, "/api/match")?.send().await?;
        decode::<serde_json::Value>(response).await?;
        Ok(())
    }

    pub async fn find_room(&self, user_id: &str) -> ClientResult<FindRoomsResponse> {
        let response = self
            .request(Method::GET, "/api/rooms")
            .query(&[("userId", user_id)])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn create_room(&self, user_id: &str) -> ClientResult<CreateRoomResponse> {
        let response = self
            .request(Method::POST, "/api/rooms")
            .query(&[("userId", user_id)])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn reopen_room(&self, room_id: &str) -> ClientResult<RoomView> {
        let response = self
            .request(Method::PUT, &format!("/api/rooms/{room_id}"))
            .send()
            .await?;
        let ReopenRoomResponse { room, .. } = decode(response).await?;
        Ok(room)
    }

    pub async fn challenges(&self) -> ClientResult<Vec<Challenge>> {
        let response = self.request(Method::GET, "/api/challenges").send().await?;
        let ChallengeList { challenges, .. } = decode(response).await?;
        Ok(challenges)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody { error }) => error,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_owned(),
    };
    Err(ClientError::Api { status, message })
}
