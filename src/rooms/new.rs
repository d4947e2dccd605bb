use axum::{debug_handler, extract::{Query, State}, Json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{rtc::TokenBuilder, AppResult, AppState};

use super::{CreateRoomResponse, Room, RoomQuery};

#[debug_handler(state = AppState)]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenBuilder>,
    Query(query): Query<RoomQuery>,
) -> AppResult<Json<CreateRoomResponse>> {
    let user_id = query.user_id()?;

    let room = Room::create(&db_pool, &user_id).await?;
    info!(user = %user_id, room = %room.id, "created room");

    let credentials = tokens.mint(&room.id, &user_id)?;
    Ok(Json(CreateRoomResponse {
        success: true,
        room: room.view(),
        rtc_token: credentials.rtc_token,
        rtm_token: credentials.rtm_token,
    }))
}
