//! # Core Traits (Ports)
//!
//! Any storage or host adapter must implement these traits to be driven by
//! the services crate. Every call is an atomic point operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Discussion, DiscussionPreference, DiscussionSubscription};

/// Persistence contract for discussion records.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DiscussionRepo: Send + Sync {
    async fn list_for_forum(&self, forum_id: Uuid) -> anyhow::Result<Vec<Discussion>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Discussion>>;

    /// Each setter returns `false` when the discussion does not exist.
    async fn set_pinned(&self, id: Uuid, pinned: bool) -> anyhow::Result<bool>;
    async fn set_time_modified(&self, id: Uuid, time_modified: DateTime<Utc>) -> anyhow::Result<bool>;
    async fn set_group(&self, id: Uuid, group_id: Option<Uuid>) -> anyhow::Result<bool>;
    async fn set_time_window(
        &self,
        id: Uuid,
        time_start: Option<DateTime<Utc>>,
        time_end: Option<DateTime<Utc>>,
    ) -> anyhow::Result<bool>;
}

/// Persistence contract for forum and discussion subscription rows.
///
/// Mutations report whether a row was actually written or removed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    // Forum rows
    async fn has_forum_subscription(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool>;
    async fn insert_forum_subscription(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool>;
    async fn delete_forum_subscription(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool>;
    async fn forum_subscribers(&self, forum_id: Uuid) -> anyhow::Result<Vec<Uuid>>;

    // Discussion rows
    async fn get_discussion_subscription(
        &self,
        user_id: Uuid,
        discussion_id: Uuid,
    ) -> anyhow::Result<Option<DiscussionSubscription>>;
    async fn upsert_discussion_subscription(&self, row: DiscussionSubscription) -> anyhow::Result<bool>;
    async fn delete_discussion_subscription(&self, user_id: Uuid, discussion_id: Uuid) -> anyhow::Result<bool>;
    async fn discussion_overrides(
        &self,
        user_id: Uuid,
        forum_id: Uuid,
    ) -> anyhow::Result<Vec<(Uuid, DiscussionPreference)>>;
    async fn overrides_for_discussion(
        &self,
        discussion_id: Uuid,
    ) -> anyhow::Result<Vec<(Uuid, DiscussionPreference)>>;

    // Bulk deletes, each returning the number of rows removed
    async fn delete_discussion_overrides(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<usize>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<usize>;
    async fn delete_all_for_forum(&self, forum_id: Uuid) -> anyhow::Result<usize>;
}

/// Host knowledge about people: enrolments and subscription permissions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ViewerDirectory: Send + Sync {
    /// `false` when the "allow force subscribe" permission is prohibited
    /// for this user in this forum.
    async fn allow_force_subscribe(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool>;
    async fn enrolled_users(&self, course_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
}
