// Feed rules - pure, no I/O. The repository feeds data in, these functions decide.
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::PostView;

/// Posts a viewer may see per local day.
pub const DAILY_VIEW_LIMIT: u32 = 10;

/// Which seen rows keep a post out of the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeenPolicy {
    /// A post shown once never comes back.
    #[default]
    Permanent,
    /// Only posts shown today are excluded; yesterday's may return.
    Daily,
}

impl SeenPolicy {
    /// Lower bound on `viewed_at` for rows that exclude a post, if any.
    pub fn exclusion_since(&self, day_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SeenPolicy::Permanent => None,
            SeenPolicy::Daily => Some(day_start),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyQuota {
    pub limit: u32,
    pub viewed_today: u32,
}

impl DailyQuota {
    pub fn new(limit: u32, viewed_today: u32) -> Self {
        Self {
            limit,
            viewed_today,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.viewed_today)
    }

    pub fn is_exhausted(&self) -> bool {
        self.viewed_today >= self.limit
    }
}

impl Serialize for DailyQuota {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("DailyQuota", 4)?;
        s.serialize_field("limit", &self.limit)?;
        s.serialize_field("viewed_today", &self.viewed_today)?;
        s.serialize_field("remaining", &self.remaining())?;
        s.serialize_field("exhausted", &self.is_exhausted())?;
        s.end()
    }
}

/// Recent posts minus what the viewer has seen and minus their own,
/// shuffled and cut to what is left of today's quota.
pub fn select_candidates<R: Rng + ?Sized>(
    recent: Vec<PostView>,
    viewer_id: &str,
    seen: &HashSet<String>,
    quota: DailyQuota,
    rng: &mut R,
) -> Vec<PostView> {
    if quota.is_exhausted() {
        return Vec::new();
    }

    let mut candidates: Vec<PostView> = recent
        .into_iter()
        .filter(|p| p.author_id != viewer_id && !seen.contains(&p.id))
        .collect();
    candidates.shuffle(rng);
    candidates.truncate(quota.remaining() as usize);
    candidates
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub quota: DailyQuota,
    pub posts: Vec<PostView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Mood, ReactionCounts};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn post(id: &str, author: &str) -> PostView {
        PostView {
            id: id.to_string(),
            author_id: author.to_string(),
            author_username: Some(author.to_string()),
            author_avatar_url: None,
            image_url: format!("/media/{}/{}.jpg", author, id),
            caption: String::new(),
            mood: Mood::Happy,
            created_at: Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap(),
            reactions: ReactionCounts::default(),
            viewer_reaction: None,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn quota_arithmetic() {
        let quota = DailyQuota::new(10, 3);
        assert_eq!(quota.remaining(), 7);
        assert!(!quota.is_exhausted());

        let full = DailyQuota::new(10, 10);
        assert_eq!(full.remaining(), 0);
        assert!(full.is_exhausted());

        // Rows recorded under a higher limit must not underflow.
        let over = DailyQuota::new(10, 12);
        assert_eq!(over.remaining(), 0);
        assert!(over.is_exhausted());
    }

    #[test]
    fn quota_serializes_derived_fields() {
        let json = serde_json::to_value(DailyQuota::new(10, 4)).unwrap();
        assert_eq!(json["limit"], 10);
        assert_eq!(json["viewed_today"], 4);
        assert_eq!(json["remaining"], 6);
        assert_eq!(json["exhausted"], false);
    }

    #[test]
    fn candidates_exclude_own_and_seen_posts() {
        let recent = vec![
            post("a", "alice"),
            post("b", "bob"),
            post("c", "viewer"),
            post("d", "dana"),
        ];
        let seen: HashSet<String> = ["b".to_string()].into_iter().collect();

        let picked = select_candidates(recent, "viewer", &seen, DailyQuota::new(10, 0), &mut rng());
        let mut ids: Vec<_> = picked.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn candidates_are_cut_to_remaining_quota() {
        let recent: Vec<_> = (0..20).map(|i| post(&format!("p{}", i), "alice")).collect();
        let picked = select_candidates(recent, "viewer", &HashSet::new(), DailyQuota::new(10, 7), &mut rng());
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn exhausted_quota_yields_nothing() {
        let recent = vec![post("a", "alice")];
        let picked = select_candidates(recent, "viewer", &HashSet::new(), DailyQuota::new(10, 10), &mut rng());
        assert!(picked.is_empty());
    }

    #[test]
    fn shuffle_keeps_every_candidate() {
        let recent: Vec<_> = (0..8).map(|i| post(&format!("p{}", i), "alice")).collect();
        let picked = select_candidates(recent, "viewer", &HashSet::new(), DailyQuota::new(10, 0), &mut rng());
        let ids: HashSet<_> = picked.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn seen_policy_exclusion_window() {
        let start = Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap();
        assert_eq!(SeenPolicy::Permanent.exclusion_since(start), None);
        assert_eq!(SeenPolicy::Daily.exclusion_since(start), Some(start));
    }

    #[test]
    fn seen_policy_parses_snake_case() {
        let policy: SeenPolicy = serde_json::from_str("\"daily\"").unwrap();
        assert_eq!(policy, SeenPolicy::Daily);
        assert_eq!(SeenPolicy::default(), SeenPolicy::Permanent);
    }
}
