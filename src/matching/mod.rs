use axum::{routing::post, Router};

mod pair;
mod release;

pub use pair::{pair, MatchResponse, MatchedUser, Pairing};
pub use release::release;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/match", post(pair::request_match).delete(release::release_match))
}

/// Both public ids, sorted, joined by `_`. The same for either side of a pair.
pub fn channel_name(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}_{second}")
}
