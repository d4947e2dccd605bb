use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use time::OffsetDateTime;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    public_id     TEXT NOT NULL UNIQUE,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    online        INTEGER NOT NULL DEFAULT 0,
    searching     INTEGER NOT NULL DEFAULT 0,
    current_match TEXT,
    created_at    INTEGER NOT NULL,
    last_active   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_available ON users (searching, online, last_active);
CREATE INDEX IF NOT EXISTS idx_users_current_match ON users (current_match);

CREATE TABLE IF NOT EXISTS rooms (
    id         TEXT PRIMARY KEY,
    status     TEXT NOT NULL CHECK (status IN ('waiting', 'chatting')),
    created_by TEXT NOT NULL,
    guest      TEXT,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rooms_waiting ON rooms (status, created_at);
"#;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// A private in-memory database. One connection that never expires, since
/// the data lives and dies with it.
pub async fn connect_memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub public_id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub online: bool,
    pub searching: bool,
    pub current_match: Option<String>,
    pub created_at: i64,
    pub last_active: i64,
}

impl User {
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id.clone(),
            public_id: self.public_id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    pub async fn by_public_id(db_pool: &SqlitePool, public_id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE public_id = ?")
            .bind(public_id)
            .fetch_optional(db_pool)
            .await
    }
}

/// What clients get to see of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(rename = "userID")]
    pub public_id: String,
    pub username: String,
    pub email: String,
}
