use axum::{routing::{get, put}, Router};
use serde::{Deserialize, Serialize};

mod find;
mod new;
mod reopen;
mod room;

pub use room::{Room, RoomStatus, RoomView, UnknownStatus};

use crate::{AppError, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/rooms", get(find::find_room).post(new::new_room))
        .route("/api/rooms/{id}", put(reopen::reopen_room))
}

#[derive(Deserialize)]
pub(crate) struct RoomQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

impl RoomQuery {
    fn user_id(self) -> Result<String, AppError> {
        self.user_id
            .filter(|user_id| !user_id.trim().is_empty())
            .ok_or("User ID is required".into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRoomsResponse {
    pub success: bool,
    pub rooms: Vec<RoomView>,
    pub rtc_token: String,
    pub rtm_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub success: bool,
    pub room: RoomView,
    pub rtc_token: String,
    pub rtm_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenRoomResponse {
    pub success: bool,
    pub room: RoomView,
}
