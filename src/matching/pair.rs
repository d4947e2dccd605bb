use axum::{debug_handler, extract::State, Json};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::{auth::Bearer, rtc::TokenBuilder, AppError, AppResult, AppState};

use super::channel_name;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MatchedUser {
    #[serde(rename = "userID")]
    pub public_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    Matched { partner: MatchedUser, channel: String },
    Searching,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub success: bool,
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_user: Option<MatchedUser>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub rtc_token: Option<String>,
    #[serde(default)]
    pub rtm_token: Option<String>,
    pub message: String,
}

enum Claim {
    Won,
    /// the candidate was claimed by someone else first
    Taken,
    /// the requester was claimed by someone else first
    Preempted,
}

/// Pairs `public_id` with a random available user, or leaves it searching.
///
/// A requester that is already matched gets its match back, so a waiting
/// user learns about its partner by asking again.
pub async fn pair(db_pool: &SqlitePool, public_id: &str) -> AppResult<Pairing> {
    if let Some(pairing) = current_pairing(db_pool, public_id).await? {
        return Ok(pairing);
    }

    let mut candidates: Vec<MatchedUser> = sqlx::query_as(
        "SELECT public_id,username FROM users \
         WHERE public_id <> ? AND online = 1 AND searching = 1 AND current_match IS NULL \
         ORDER BY last_active DESC",
    )
    .bind(public_id)
    .fetch_all(db_pool)
    .await?;
    debug!(user = %public_id, available = candidates.len(), "looking for a partner");

    while !candidates.is_empty() {
        let partner = candidates.swap_remove(rand::rng().random_range(0..candidates.len()));

        match claim(db_pool, public_id, &partner.public_id).await? {
            Claim::Won => {
                info!(user = %public_id, partner = %partner.public_id, "matched");
                let channel = channel_name(public_id, &partner.public_id);
                return Ok(Pairing::Matched { partner, channel });
            }
            Claim::Taken => {
                debug!(user = %public_id, partner = %partner.public_id, "partner taken, trying the next one");
            }
            Claim::Preempted => break,
        }
    }

    let searching = sqlx::query(
        "UPDATE users SET searching = 1, current_match = NULL WHERE public_id = ? AND current_match IS NULL",
    )
    .bind(public_id)
    .execute(db_pool)
    .await?;

    if searching.rows_affected() == 0 {
        // someone claimed us in the meantime, or we do not exist
        return current_pairing(db_pool, public_id)
            .await?
            .ok_or(AppError::NotFound("User".to_owned()));
    }

    info!(user = %public_id, "searching");
    Ok(Pairing::Searching)
}

async fn current_pairing(db_pool: &SqlitePool, public_id: &str) -> Result<Option<Pairing>, sqlx::Error> {
    let partner: Option<MatchedUser> = sqlx::query_as(
        "SELECT p.public_id,p.username FROM users u JOIN users p ON p.public_id = u.current_match \
         WHERE u.public_id = ?",
    )
    .bind(public_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(partner.map(|partner| Pairing::Matched {
        channel: channel_name(public_id, &partner.public_id),
        partner,
    }))
}

/// Both sides are compare-and-swapped in one transaction, so no user ever ends
/// up in two matches.
async fn claim(db_pool: &SqlitePool, public_id: &str, partner: &str) -> Result<Claim, sqlx::Error> {
    let mut tx = db_pool.begin().await?;

    let taken = sqlx::query(
        "UPDATE users SET current_match = ?, searching = 0 \
         WHERE public_id = ? AND searching = 1 AND current_match IS NULL",
    )
    .bind(public_id)
    .bind(partner)
    .execute(&mut *tx)
    .await?;
    if taken.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(Claim::Taken);
    }

    let own = sqlx::query(
        "UPDATE users SET current_match = ?, searching = 0 WHERE public_id = ? AND current_match IS NULL",
    )
    .bind(partner)
    .bind(public_id)
    .execute(&mut *tx)
    .await?;
    if own.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(Claim::Preempted);
    }

    tx.commit().await?;
    Ok(Claim::Won)
}

#[debug_handler(state = AppState)]
pub(crate) async fn request_match(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenBuilder>,
    Bearer(claims): Bearer,
) -> AppResult<Json<MatchResponse>> {
    let response = match pair(&db_pool, &claims.public_id).await? {
        Pairing::Matched { partner, channel } => {
            let credentials = tokens.mint(&channel, &claims.public_id)?;
            MatchResponse {
                success: true,
                matched: true,
                message: format!("Matched with {}!", partner.username),
                matched_user: Some(partner),
                channel_name: Some(channel),
                rtc_token: Some(credentials.rtc_token),
                rtm_token: Some(credentials.rtm_token),
            }
        }
        Pairing::Searching => MatchResponse {
            success: true,
            matched: false,
            matched_user: None,
            channel_name: None,
            rtc_token: None,
            rtm_token: None,
            message: "Searching for someone to chat with...".to_owned(),
        },
    };

    Ok(Json(response))
}
