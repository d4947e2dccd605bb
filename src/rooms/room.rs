use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::db::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Chatting,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Chatting => "chatting",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown room status {0:?}")]
pub struct UnknownStatus(String);

impl TryFrom<String> for RoomStatus {
    type Error = UnknownStatus;

    fn try_from(status: String) -> Result<Self, Self::Error> {
        match status.as_str() {
            "waiting" => Ok(RoomStatus::Waiting),
            "chatting" => Ok(RoomStatus::Chatting),
            _ => Err(UnknownStatus(status)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Room {
    pub id: String,
    #[sqlx(try_from = "String")]
    pub status: RoomStatus,
    pub created_by: String,
    pub guest: Option<String>,
    pub created_at: i64,
}

/// A room as clients see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: String,
    pub status: RoomStatus,
    pub created_by: String,
    pub participants: Vec<String>,
    pub created_at: i64,
}

impl Room {
    /// Creator first, then the guest if there is one.
    pub fn participants(&self) -> Vec<String> {
        std::iter::once(self.created_by.clone())
            .chain(self.guest.clone())
            .collect()
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            id: self.id.clone(),
            status: self.status,
            created_by: self.created_by.clone(),
            participants: self.participants(),
            created_at: self.created_at,
        }
    }

    pub async fn get(db_pool: &SqlitePool, id: &str) -> Result<Option<Room>, sqlx::Error> {
        sqlx::query_as("SELECT id,status,created_by,guest,created_at FROM rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(db_pool)
            .await
    }

    pub async fn create(db_pool: &SqlitePool, user_id: &str) -> Result<Room, sqlx::Error> {
        let room = Room {
            id: Uuid::now_v7().to_string(),
            status: RoomStatus::Waiting,
            created_by: user_id.to_owned(),
            guest: None,
            created_at: now_millis(),
        };

        sqlx::query("INSERT INTO rooms (id,status,created_by,guest,created_at) VALUES (?,?,?,NULL,?)")
            .bind(&room.id)
            .bind(room.status.as_str())
            .bind(&room.created_by)
            .bind(room.created_at)
            .execute(db_pool)
            .await?;

        Ok(room)
    }

    /// Takes the oldest waiting room someone else created. Each room is
    /// compare-and-swapped from `waiting` to `chatting`, so a room never gets
    /// two guests; a room lost to another joiner is skipped.
    pub async fn join_waiting(db_pool: &SqlitePool, user_id: &str) -> Result<Option<Room>, sqlx::Error> {
        let waiting: Vec<Room> = sqlx::query_as(
            "SELECT id,status,created_by,guest,created_at FROM rooms \
             WHERE status = 'waiting' AND created_by <> ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(db_pool)
        .await?;

        for room in waiting {
            let claimed = sqlx::query(
                "UPDATE rooms SET status = 'chatting', guest = ? WHERE id = ? AND status = 'waiting'",
            )
            .bind(user_id)
            .bind(&room.id)
            .execute(db_pool)
            .await?;

            if claimed.rows_affected() == 1 {
                return Ok(Some(Room {
                    status: RoomStatus::Chatting,
                    guest: Some(user_id.to_owned()),
                    ..room
                }));
            }
        }

        Ok(None)
    }

    /// Joins a waiting room, or opens a new one when none is waiting.
    pub async fn request(db_pool: &SqlitePool, user_id: &str) -> Result<Room, sqlx::Error> {
        match Room::join_waiting(db_pool, user_id).await? {
            Some(room) => Ok(room),
            None => Room::create(db_pool, user_id).await,
        }
    }

    /// Puts a room back to `waiting` with only its creator in it.
    pub async fn reopen(db_pool: &SqlitePool, id: &str) -> Result<Option<Room>, sqlx::Error> {
        let reopened = sqlx::query("UPDATE rooms SET status = 'waiting', guest = NULL WHERE id = ?")
            .bind(id)
            .execute(db_pool)
            .await?;
        if reopened.rows_affected() == 0 {
            return Ok(None);
        }
        Room::get(db_pool, id).await
    }
}
