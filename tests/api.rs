mod common;

use engagee::{
    client::{ApiClient, ClientError},
    matching::channel_name,
    rooms::RoomStatus,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, APP_ID};

fn api_error(result: Result<impl std::fmt::Debug, ClientError>) -> (StatusCode, String) {
    match result {
        Err(ClientError::Api { status, message }) => (status, message),
        other => panic!("expected an API error, got {other:?}"),
    }
}

#[tokio::test]
async fn register_login_verify() {
    let base = spawn_app().await;
    let mut alice = ApiClient::new(&base);

    let registered = alice.register("alice@x.com", "alice", "pw1").await.unwrap();
    assert!(registered.public_id.starts_with("USER_"));
    assert_eq!(registered.username, "alice");
    assert_eq!(alice.verify().await.unwrap(), registered);

    let mut again = ApiClient::new(&base);
    assert_eq!(again.login("alice", "pw1").await.unwrap(), registered);
    assert_eq!(again.login("alice@x.com", "pw1").await.unwrap(), registered);

    let (status, message) = api_error(again.login("alice", "nope").await);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "Invalid credentials");

    let (status, message) = api_error(again.register("alice@x.com", "someone", "pw").await);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "User already exists");
}

#[tokio::test]
async fn auth_wire_contract() {
    let base = spawn_app().await;
    let http = reqwest::Client::new();

    let created = http
        .post(format!("{base}/api/auth"))
        .json(&json!({ "action": "register", "email": "bob@x.com", "username": "bob", "password": "pw2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["token"].as_str().is_some_and(|token| !token.is_empty()));
    assert!(body["user"]["userID"].as_str().is_some_and(|id| id.starts_with("USER_")));

    let unknown = http
        .post(format!("{base}/api/auth"))
        .json(&json!({ "action": "reset", "email": "bob@x.com", "password": "pw2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::METHOD_NOT_ALLOWED);

    let no_username = http
        .post(format!("{base}/api/auth"))
        .json(&json!({ "action": "register", "email": "carol@x.com", "password": "pw3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(no_username.status(), StatusCode::BAD_REQUEST);

    let no_token = http.get(format!("{base}/api/auth/verify")).send().await.unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);
    let body: Value = no_token.json().await.unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Access token required" }));

    let bad_token = http
        .get(format!("{base}/api/auth/verify"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_token.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn matching_pairs_two_users() {
    let base = spawn_app().await;
    let mut alice = ApiClient::new(&base);
    let mut bob = ApiClient::new(&base);
    let alice_profile = alice.register("alice@x.com", "alice", "pw1").await.unwrap();
    let bob_profile = bob.register("bob@x.com", "bob", "pw2").await.unwrap();

    let waiting = alice.request_match().await.unwrap();
    assert!(waiting.success);
    assert!(!waiting.matched);
    assert!(waiting.matched_user.is_none());

    let matched = bob.request_match().await.unwrap();
    assert!(matched.matched);
    assert_eq!(matched.matched_user.as_ref().unwrap().public_id, alice_profile.public_id);
    let channel = channel_name(&alice_profile.public_id, &bob_profile.public_id);
    assert_eq!(matched.channel_name.as_deref(), Some(channel.as_str()));
    assert!(matched.rtc_token.as_deref().is_some_and(|token| token.starts_with(&format!("006{APP_ID}"))));
    assert!(matched.rtm_token.as_deref().is_some_and(|token| token.starts_with("006")));
    assert_eq!(matched.message, "Matched with alice!");

    // the waiting side learns about its partner by asking again
    let seen = alice.request_match().await.unwrap();
    assert!(seen.matched);
    assert_eq!(seen.matched_user.unwrap().public_id, bob_profile.public_id);
    assert_eq!(seen.channel_name.as_deref(), Some(channel.as_str()));

    bob.release_match().await.unwrap();
    let alone = alice.request_match().await.unwrap();
    assert!(!alone.matched);
}

#[tokio::test]
async fn matching_requires_a_token() {
    let base = spawn_app().await;
    let response = reqwest::Client::new()
        .post(format!("{base}/api/match"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rooms_find_create_reopen() {
    let base = spawn_app().await;
    let api = ApiClient::new(&base);

    let empty = api.find_room("alice").await.unwrap();
    assert!(empty.rooms.is_empty());
    assert_eq!(empty.rtc_token, "");
    assert_eq!(empty.message.as_deref(), Some("No waiting rooms available"));

    let created = api.create_room("alice").await.unwrap();
    assert_eq!(created.room.status, RoomStatus::Waiting);
    assert_eq!(created.room.participants, vec!["alice".to_owned()]);
    assert!(created.rtc_token.starts_with("006"));

    let joined = api.find_room("bob").await.unwrap();
    assert_eq!(joined.rooms.len(), 1);
    assert_eq!(joined.rooms[0].id, created.room.id);
    assert_eq!(joined.rooms[0].status, RoomStatus::Chatting);
    assert_eq!(joined.rooms[0].participants, vec!["alice".to_owned(), "bob".to_owned()]);

    assert!(api.find_room("carol").await.unwrap().rooms.is_empty());

    let reopened = api.reopen_room(&created.room.id).await.unwrap();
    assert_eq!(reopened.status, RoomStatus::Waiting);
    assert_eq!(reopened.participants, vec!["alice".to_owned()]);
    assert_eq!(api.find_room("carol").await.unwrap().rooms[0].id, created.room.id);

    let (status, message) = api_error(api.reopen_room("no-such-room").await);
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message, "Room not found");
}

#[tokio::test]
async fn rooms_need_a_user_id() {
    let base = spawn_app().await;
    let response = reqwest::get(format!("{base}/api/rooms")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "User ID is required");
}

#[tokio::test]
async fn challenge_catalog() {
    let base = spawn_app().await;
    let challenges = ApiClient::new(&base).challenges().await.unwrap();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].title, "Quick Math");
}

#[tokio::test]
async fn logout_takes_the_user_out_of_matching() {
    let base = spawn_app().await;
    let mut alice = ApiClient::new(&base);
    let mut bob = ApiClient::new(&base);
    alice.register("alice@x.com", "alice", "pw1").await.unwrap();
    bob.register("bob@x.com", "bob", "pw2").await.unwrap();

    alice.request_match().await.unwrap();
    alice.logout().await.unwrap();
    assert_eq!(alice.token(), None);
    assert!(matches!(alice.verify().await, Err(ClientError::SignedOut)));

    // alice is offline, so bob has nobody to meet
    assert!(!bob.request_match().await.unwrap().matched);
}

#[tokio::test]
async fn cookie_session_stands_in_for_the_bearer_token() {
    let base = spawn_app().await;
    let http = reqwest::Client::new();

    let registered = http
        .post(format!("{base}/api/auth"))
        .json(&json!({ "action": "register", "email": "dana@x.com", "username": "dana", "password": "pw4" }))
        .send()
        .await
        .unwrap();
    assert_eq!(registered.status(), StatusCode::CREATED);
    let cookie = registered
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
        .expect("session cookie");
    let body: Value = registered.json().await.unwrap();

    let verified = http
        .get(format!("{base}/api/auth/verify"))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(verified.status(), StatusCode::OK);
    let verified: Value = verified.json().await.unwrap();
    assert_eq!(verified["user"], body["user"]);

    let matched = http
        .post(format!("{base}/api/match"))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(matched.status(), StatusCode::OK);

    let logout = http
        .post(format!("{base}/api/auth/logout"))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    let after = http
        .get(format!("{base}/api/auth/verify"))
        .header(reqwest::header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}
