use axum::{routing::{get, post}, Router};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

mod keys;
mod login;
mod logout;
mod verify;

pub use keys::{Claims, SessionKeys, TOKEN_LIFETIME};
pub use verify::{bearer_token, Bearer};

use crate::{db::{now_millis, Profile, User}, matching, AppError, AppResult, AppState};

pub const BCRYPT_COST: u32 = 12;
const PUBLIC_ID_ATTEMPTS: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth", post(login::auth))
        .route("/api/auth/verify", get(verify::verify))
        .route("/api/auth/logout", post(logout::logout))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: Profile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub user: Profile,
}

/// `USER_<epoch-ms>_<4 digits>`
pub fn generate_public_id() -> String {
    let suffix: u16 = rand::rng().random_range(0..10_000);
    format!("USER_{}_{suffix:04}", now_millis())
}

pub async fn register(
    db_pool: &SqlitePool,
    keys: &SessionKeys,
    email: &str,
    username: &str,
    password: &str,
) -> AppResult<(String, Profile)> {
    let existing = sqlx::query("SELECT 1 FROM users WHERE email = ? OR username = ?")
        .bind(email)
        .bind(username)
        .fetch_optional(db_pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict);
    }

    let password_hash = hash_password(password).await?;
    let now = now_millis();
    let mut user = User {
        id: Uuid::now_v7().to_string(),
        public_id: generate_public_id(),
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash,
        online: true,
        searching: false,
        current_match: None,
        created_at: now,
        last_active: now,
    };
    insert_user(db_pool, &mut user, generate_public_id).await?;

    info!(user = %user.public_id, username = %user.username, "registered");
    let token = keys.encode(&Claims::for_user(&user))?;
    Ok((token, user.profile()))
}

/// Inserts `user`, drawing a fresh public id from `next_public_id` when the
/// current one is taken. Email or username collisions are a `Conflict`.
async fn insert_user(
    db_pool: &SqlitePool,
    user: &mut User,
    next_public_id: impl Fn() -> String,
) -> AppResult<()> {
    let mut attempts = 0;
    loop {
        let inserted = sqlx::query(
            "INSERT INTO users (id,public_id,username,email,password_hash,online,searching,current_match,created_at,last_active) \
             VALUES (?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(&user.id)
        .bind(&user.public_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.online)
        .bind(user.searching)
        .bind(&user.current_match)
        .bind(user.created_at)
        .bind(user.last_active)
        .execute(db_pool)
        .await;

        match inserted {
            Ok(_) => return Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                if !err.message().contains("users.public_id") {
                    // lost a race against a concurrent registration
                    return Err(AppError::Conflict);
                }
                attempts += 1;
                if attempts >= PUBLIC_ID_ATTEMPTS {
                    return Err(sqlx::Error::Database(err).into());
                }
                debug!(public_id = %user.public_id, "public id taken, drawing another");
                user.public_id = next_public_id();
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// `identifier` is either the email or the username.
pub async fn login(
    db_pool: &SqlitePool,
    keys: &SessionKeys,
    identifier: &str,
    password: &str,
) -> AppResult<(String, Profile)> {
    let Some(mut user): Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE email = ? OR username = ? LIMIT 1")
            .bind(identifier)
            .bind(identifier)
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    user.last_active = now_millis();
    user.online = true;
    sqlx::query("UPDATE users SET online = 1, last_active = ? WHERE id = ?")
        .bind(user.last_active)
        .bind(&user.id)
        .execute(db_pool)
        .await?;

    info!(user = %user.public_id, "logged in");
    let token = keys.encode(&Claims::for_user(&user))?;
    Ok((token, user.profile()))
}

/// Marks the user offline and drops whatever match they were in.
pub async fn go_offline(db_pool: &SqlitePool, public_id: &str) -> AppResult<()> {
    matching::release(db_pool, public_id).await?;
    sqlx::query("UPDATE users SET online = 0 WHERE public_id = ?")
        .bind(public_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_owned();
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??)
}

async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}

#[cfg(test)]
mod tests {
    use crate::db::connect_memory;

    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"test-secret")
    }

    #[test]
    fn public_id_shape() {
        let id = generate_public_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "USER");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let db_pool = connect_memory().await.unwrap();
        register(&db_pool, &keys(), "alice@x.com", "alice", "pw1").await.unwrap();

        let same_email = register(&db_pool, &keys(), "alice@x.com", "alice2", "pw1").await;
        assert!(matches!(same_email, Err(AppError::Conflict)));

        let same_username = register(&db_pool, &keys(), "other@x.com", "alice", "pw1").await;
        assert!(matches!(same_username, Err(AppError::Conflict)));
    }

    #[tokio::test]
    async fn register_stores_a_hash_and_marks_online() {
        let db_pool = connect_memory().await.unwrap();
        let (token, profile) = register(&db_pool, &keys(), "alice@x.com", "alice", "pw1").await.unwrap();

        let user = User::by_public_id(&db_pool, &profile.public_id).await.unwrap().unwrap();
        assert_ne!(user.password_hash, "pw1");
        assert!(bcrypt::verify("pw1", &user.password_hash).unwrap());
        assert!(user.online);
        assert!(!user.searching);

        assert_eq!(keys().decode(&token).unwrap().profile(), profile);
    }

    fn user(public_id: &str, username: &str, email: &str) -> User {
        User {
            id: Uuid::now_v7().to_string(),
            public_id: public_id.to_owned(),
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash: "x".to_owned(),
            online: true,
            searching: false,
            current_match: None,
            created_at: now_millis(),
            last_active: now_millis(),
        }
    }

    #[tokio::test]
    async fn taken_public_id_is_redrawn() {
        let db_pool = connect_memory().await.unwrap();
        insert_user(&db_pool, &mut user("USER_1_0001", "alice", "alice@x.com"), generate_public_id)
            .await
            .unwrap();

        let mut bob = user("USER_1_0001", "bob", "bob@x.com");
        insert_user(&db_pool, &mut bob, || "USER_1_0002".to_owned()).await.unwrap();

        assert_eq!(bob.public_id, "USER_1_0002");
        let stored = User::by_public_id(&db_pool, "USER_1_0002").await.unwrap().unwrap();
        assert_eq!(stored.username, "bob");
    }

    #[tokio::test]
    async fn public_id_that_never_frees_up_is_internal() {
        let db_pool = connect_memory().await.unwrap();
        insert_user(&db_pool, &mut user("USER_1_0001", "alice", "alice@x.com"), generate_public_id)
            .await
            .unwrap();

        let mut bob = user("USER_1_0001", "bob", "bob@x.com");
        let result = insert_user(&db_pool, &mut bob, || "USER_1_0001".to_owned()).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn racing_email_is_a_conflict() {
        let db_pool = connect_memory().await.unwrap();
        insert_user(&db_pool, &mut user("USER_1_0001", "alice", "alice@x.com"), generate_public_id)
            .await
            .unwrap();

        let mut twin = user("USER_2_0002", "alice2", "alice@x.com");
        let result = insert_user(&db_pool, &mut twin, generate_public_id).await;
        assert!(matches!(result, Err(AppError::Conflict)));
    }

    #[tokio::test]
    async fn login_by_email_or_username() {
        let db_pool = connect_memory().await.unwrap();
        let (_, registered) = register(&db_pool, &keys(), "bob@x.com", "bob", "pw2").await.unwrap();

        let (token, by_email) = login(&db_pool, &keys(), "bob@x.com", "pw2").await.unwrap();
        let (_, by_username) = login(&db_pool, &keys(), "bob", "pw2").await.unwrap();
        assert_eq!(by_email, registered);
        assert_eq!(by_username, registered);
        assert_eq!(keys().decode(&token).unwrap().public_id, registered.public_id);
    }

    #[tokio::test]
    async fn wrong_password_changes_nothing() {
        let db_pool = connect_memory().await.unwrap();
        let (_, profile) = register(&db_pool, &keys(), "bob@x.com", "bob", "pw2").await.unwrap();
        sqlx::query("UPDATE users SET online = 0, last_active = 1 WHERE public_id = ?")
            .bind(&profile.public_id)
            .execute(&db_pool)
            .await
            .unwrap();

        let attempt = login(&db_pool, &keys(), "bob", "wrong").await;
        assert!(matches!(attempt, Err(AppError::InvalidCredentials)));

        let user = User::by_public_id(&db_pool, &profile.public_id).await.unwrap().unwrap();
        assert!(!user.online);
        assert_eq!(user.last_active, 1);
    }

    #[tokio::test]
    async fn unknown_user_is_invalid_credentials() {
        let db_pool = connect_memory().await.unwrap();
        let attempt = login(&db_pool, &keys(), "nobody", "pw").await;
        assert!(matches!(attempt, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn login_refreshes_presence() {
        let db_pool = connect_memory().await.unwrap();
        let (_, profile) = register(&db_pool, &keys(), "bob@x.com", "bob", "pw2").await.unwrap();
        go_offline(&db_pool, &profile.public_id).await.unwrap();
        assert!(!User::by_public_id(&db_pool, &profile.public_id).await.unwrap().unwrap().online);

        login(&db_pool, &keys(), "bob", "pw2").await.unwrap();
        let user = User::by_public_id(&db_pool, &profile.public_id).await.unwrap().unwrap();
        assert!(user.online);
        assert!(user.last_active > 1);
    }
}
