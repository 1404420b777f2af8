use chrono::{DateTime, Utc};
use serde::Serialize;

use super::calendar::DatedMood;
use super::mood::Mood;
use super::reaction::{ReactionCounts, ReactionKind};

/// A post as clients see it: author summary, reaction tally and the
/// viewer's own reaction, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: String,
    pub author_id: String,
    pub author_username: Option<String>,
    pub author_avatar_url: Option<String>,
    pub image_url: String,
    pub caption: String,
    pub mood: Mood,
    pub created_at: DateTime<Utc>,
    pub reactions: ReactionCounts,
    pub viewer_reaction: Option<ReactionKind>,
}

impl PostView {
    pub fn dated_mood(&self) -> DatedMood {
        DatedMood {
            created_at: self.created_at,
            mood: self.mood,
        }
    }
}

/// Moods of the most recent post on both sides agree.
pub fn vibe_match(mine: Option<Mood>, theirs: Option<Mood>) -> bool {
    matches!((mine, theirs), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vibe_match_needs_both_latest_moods() {
        assert!(vibe_match(Some(Mood::Sad), Some(Mood::Sad)));
        assert!(!vibe_match(Some(Mood::Sad), Some(Mood::Happy)));
        assert!(!vibe_match(None, Some(Mood::Happy)));
        assert!(!vibe_match(None, None));
    }
}
