use axum::{debug_handler, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/challenges", get(list_challenges))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    Solo,
    Versus,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: u32,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ChallengeKind,
    pub difficulty: Difficulty,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeList {
    pub success: bool,
    pub challenges: Vec<Challenge>,
}

// Scoring, stats and completions are not tracked; the catalog is all there is.
pub fn catalog() -> Vec<Challenge> {
    vec![Challenge {
        id: 1,
        title: "Quick Math".to_owned(),
        description: "Solve 10 math problems as fast as possible".to_owned(),
        kind: ChallengeKind::Solo,
        difficulty: Difficulty::Easy,
        points: 50,
    }]
}

#[debug_handler(state = AppState)]
async fn list_challenges() -> Json<ChallengeList> {
    Json(ChallengeList {
        success: true,
        challenges: catalog(),
    })
}
