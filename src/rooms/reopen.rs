use axum::{debug_handler, extract::{Path, State}, Json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{AppError, AppResult, AppState};

use super::{ReopenRoomResponse, Room};

#[debug_handler(state = AppState)]
pub(crate) async fn reopen_room(
    State(db_pool): State<SqlitePool>,
    Path(room_id): Path<String>,
) -> AppResult<Json<ReopenRoomResponse>> {
    let room = Room::reopen(&db_pool, &room_id)
        .await?
        .ok_or(AppError::NotFound("Room".to_owned()))?;
    info!(room = %room.id, "room waiting again");

    Ok(Json(ReopenRoomResponse {
        success: true,
        room: room.view(),
    }))
}
