use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::domain::mood::MoodPalette;
use crate::domain::{Mood, ReactionKind};
use crate::state::AppState;

#[derive(Serialize)]
pub struct MoodEntry {
    pub mood: Mood,
    pub emoji: &'static str,
    pub palette: MoodPalette,
}

#[derive(Serialize)]
pub struct ReactionEntry {
    pub reaction: ReactionKind,
    pub emoji: &'static str,
}

#[derive(Serialize)]
pub struct Catalog {
    pub moods: Vec<MoodEntry>,
    pub reactions: Vec<ReactionEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/catalog", get(catalog))
}

/// Display data clients need to draw mood badges and reaction buttons.
async fn catalog() -> Json<Catalog> {
    Json(build_catalog())
}

fn build_catalog() -> Catalog {
    Catalog {
        moods: Mood::ALL
            .into_iter()
            .map(|mood| MoodEntry {
                mood,
                emoji: mood.emoji(),
                palette: mood.palette(),
            })
            .collect(),
        reactions: ReactionKind::ALL
            .into_iter()
            .map(|reaction| ReactionEntry {
                reaction,
                emoji: reaction.emoji(),
            })
            .collect(),
    }
}
