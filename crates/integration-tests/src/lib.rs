//! Shared fixtures for the end-to-end tests: services wired to the
//! in-memory adapters, plus builders for forums and discussions.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use domains::models::{Discussion, Forum, SubscriptionMode};
use services::{DiscussionService, SubscriptionCache, SubscriptionStateMachine};
use storage_adapters::{InMemoryDiscussionRepo, InMemorySubscriptionRepo, StaticViewerDirectory};
use uuid::Uuid;

pub struct Harness {
    pub course_id: Uuid,
    pub discussions: Arc<InMemoryDiscussionRepo>,
    pub subscription_rows: Arc<InMemorySubscriptionRepo>,
    pub directory: Arc<StaticViewerDirectory>,
    pub listing: DiscussionService,
    pub subscriptions: SubscriptionStateMachine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cache(true)
    }

    pub fn with_cache(cache_enabled: bool) -> Self {
        let discussions = Arc::new(InMemoryDiscussionRepo::new());
        let subscription_rows = Arc::new(InMemorySubscriptionRepo::new());
        let directory = Arc::new(StaticViewerDirectory::new());
        Self {
            course_id: Uuid::now_v7(),
            listing: DiscussionService::new(discussions.clone()),
            subscriptions: SubscriptionStateMachine::new(
                subscription_rows.clone(),
                directory.clone(),
                SubscriptionCache::new(cache_enabled),
            ),
            discussions,
            subscription_rows,
            directory,
        }
    }

    pub fn forum(&self, mode: SubscriptionMode) -> Forum {
        Forum::new(Uuid::now_v7(), self.course_id).with_subscription_mode(mode)
    }

    /// Enrols a fresh user in the harness course.
    pub fn user(&self) -> Uuid {
        let user_id = Uuid::now_v7();
        self.directory.enrol(self.course_id, user_id);
        user_id
    }

    /// Stores a discussion with id `seq`, created `seq` seconds after the
    /// epoch used by every fixture and last modified at `t0 + modified`.
    pub fn discussion(&self, forum: &Forum, seq: u128, modified: i64) -> Discussion {
        let mut discussion = Discussion::new(
            Uuid::from_u128(seq),
            forum.id,
            Uuid::from_u128(u128::MAX - seq),
            t0() + Duration::seconds(seq as i64),
        );
        discussion.time_modified = t0() + Duration::seconds(modified);
        self.discussions.insert(discussion.clone());
        discussion
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed reference time of all fixtures.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
}

pub fn ids(discussions: &[Discussion]) -> Vec<u128> {
    discussions.iter().map(|d| d.id.as_u128()).collect()
}
