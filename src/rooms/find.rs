use axum::{debug_handler, extract::{Query, State}, Json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{rtc::TokenBuilder, AppResult, AppState};

use super::{FindRoomsResponse, Room, RoomQuery};

#[debug_handler(state = AppState)]
pub(crate) async fn find_room(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenBuilder>,
    Query(query): Query<RoomQuery>,
) -> AppResult<Json<FindRoomsResponse>> {
    let user_id = query.user_id()?;

    let Some(room) = Room::join_waiting(&db_pool, &user_id).await? else {
        info!(user = %user_id, "no waiting rooms");
        return Ok(Json(FindRoomsResponse {
            success: true,
            rooms: Vec::new(),
            rtc_token: String::new(),
            rtm_token: String::new(),
            message: Some("No waiting rooms available".to_owned()),
        }));
    };

    info!(user = %user_id, room = %room.id, "joined room");
    let credentials = tokens.mint(&room.id, &user_id)?;
    Ok(Json(FindRoomsResponse {
        success: true,
        rooms: vec![room.view()],
        rtc_token: credentials.rtc_token,
        rtm_token: credentials.rtm_token,
        message: None,
    }))
}
