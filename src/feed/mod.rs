pub mod domain;
pub mod repository;

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::config::FeedConfig;
use crate::domain::calendar::day_start_utc;

pub use domain::{select_candidates, DailyQuota, FeedPage, SeenPolicy, DAILY_VIEW_LIMIT};
pub use repository::{FeedRepository, MarkSeen, RepositoryError, SqliteFeedRepository};

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("You have reached the daily limit of {0} truths")]
    QuotaExhausted(u32),

    #[error("Post not found")]
    UnknownPost,

    #[error("Your own posts never appear in your feed")]
    OwnPost,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Quota, candidate selection and view bookkeeping for one viewer at a time.
pub struct FeedService<R> {
    repo: Arc<R>,
    config: FeedConfig,
}

impl<R> Clone for FeedService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            config: self.config.clone(),
        }
    }
}

impl<R: FeedRepository> FeedService<R> {
    pub fn new(repo: R, config: FeedConfig) -> Self {
        Self {
            repo: Arc::new(repo),
            config,
        }
    }

    fn day_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        day_start_utc(now, self.config.offset())
    }

    pub async fn quota(&self, viewer_id: &str, now: DateTime<Utc>) -> Result<DailyQuota, FeedError> {
        let viewed = self
            .repo
            .count_seen_since(viewer_id, self.day_start(now))
            .await?;
        Ok(DailyQuota::new(self.config.daily_view_limit, viewed))
    }

    /// Today's feed. Nothing is fetched once the quota is spent.
    pub async fn load<G: Rng + Send + ?Sized>(
        &self,
        viewer_id: &str,
        now: DateTime<Utc>,
        rng: &mut G,
    ) -> Result<FeedPage, FeedError> {
        let quota = self.quota(viewer_id, now).await?;
        if quota.is_exhausted() {
            tracing::debug!(viewer = viewer_id, "Daily quota exhausted");
            return Ok(FeedPage {
                quota,
                posts: Vec::new(),
            });
        }

        let since = self.config.seen_policy.exclusion_since(self.day_start(now));
        let seen = self.repo.seen_post_ids(viewer_id, since).await?;
        let recent = self
            .repo
            .recent_posts(viewer_id, self.config.candidate_pool)
            .await?;

        let posts = select_candidates(recent, viewer_id, &seen, quota, rng);
        tracing::debug!(
            viewer = viewer_id,
            candidates = posts.len(),
            remaining = quota.remaining(),
            "Feed loaded"
        );
        Ok(FeedPage { quota, posts })
    }

    /// Records that the viewer moved past a post.
    pub async fn mark_seen(
        &self,
        viewer_id: &str,
        post_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DailyQuota, FeedError> {
        self.check_target(viewer_id, post_id).await?;

        let limit = self.config.daily_view_limit;
        match self
            .repo
            .mark_seen(viewer_id, post_id, self.day_start(now), now, limit)
            .await?
        {
            MarkSeen::Recorded | MarkSeen::AlreadySeen => self.quota(viewer_id, now).await,
            MarkSeen::QuotaExhausted => Err(FeedError::QuotaExhausted(limit)),
        }
    }

    /// Files a report and removes the post from the reporter's feed.
    pub async fn report(
        &self,
        reporter_id: &str,
        post_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<DailyQuota, FeedError> {
        self.check_target(reporter_id, post_id).await?;

        self.repo
            .report_and_hide(reporter_id, post_id, reason, self.day_start(now), now)
            .await?;
        tracing::info!(post = post_id, reporter = reporter_id, "Post reported");
        self.quota(reporter_id, now).await
    }

    async fn check_target(&self, viewer_id: &str, post_id: &str) -> Result<(), FeedError> {
        match self.repo.post_author(post_id).await? {
            None => Err(FeedError::UnknownPost),
            Some(author) if author == viewer_id => Err(FeedError::OwnPost),
            Some(_) => Ok(()),
        }
    }
}
