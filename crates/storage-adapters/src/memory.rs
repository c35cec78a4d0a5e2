//! # In-memory repositories
//!
//! `DashMap`-backed implementations of the discussion and subscription
//! ports. Each map operation is atomic, which is all the ports promise.
//! Used by the seed binary and the integration tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use domains::models::{Discussion, DiscussionPreference, DiscussionSubscription};
use domains::ports::{DiscussionRepo, SubscriptionRepo};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryDiscussionRepo {
    discussions: DashMap<Uuid, Discussion>,
}

impl InMemoryDiscussionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces a discussion.
    pub fn insert(&self, discussion: Discussion) {
        self.discussions.insert(discussion.id, discussion);
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut Discussion)) -> bool {
        match self.discussions.get_mut(&id) {
            Some(mut entry) => {
                apply(entry.value_mut());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl DiscussionRepo for InMemoryDiscussionRepo {
    async fn list_for_forum(&self, forum_id: Uuid) -> anyhow::Result<Vec<Discussion>> {
        Ok(self
            .discussions
            .iter()
            .filter(|entry| entry.forum_id == forum_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Discussion>> {
        Ok(self.discussions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool) -> anyhow::Result<bool> {
        Ok(self.update(id, |d| d.pinned = pinned))
    }

    async fn set_time_modified(&self, id: Uuid, time_modified: DateTime<Utc>) -> anyhow::Result<bool> {
        Ok(self.update(id, |d| d.time_modified = time_modified))
    }

    async fn set_group(&self, id: Uuid, group_id: Option<Uuid>) -> anyhow::Result<bool> {
        Ok(self.update(id, |d| d.group_id = group_id))
    }

    async fn set_time_window(
        &self,
        id: Uuid,
        time_start: Option<DateTime<Utc>>,
        time_end: Option<DateTime<Utc>>,
    ) -> anyhow::Result<bool> {
        Ok(self.update(id, |d| {
            d.time_start = time_start;
            d.time_end = time_end;
        }))
    }
}

/// Forum rows keyed by `(user, forum)`, discussion rows by `(user, discussion)`.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRepo {
    forum_rows: DashSet<(Uuid, Uuid)>,
    discussion_rows: DashMap<(Uuid, Uuid), DiscussionSubscription>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forum_row_count(&self) -> usize {
        self.forum_rows.len()
    }

    /// Every discussion row held by `user_id`, in no particular order.
    pub fn discussion_rows_for(&self, user_id: Uuid) -> Vec<DiscussionSubscription> {
        self.discussion_rows
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Counted inside `retain` so rows inserted concurrently never skew it.
    fn remove_discussion_rows(&self, keep: impl Fn(&DiscussionSubscription) -> bool) -> usize {
        let mut removed = 0;
        self.discussion_rows.retain(|_, row| {
            let kept = keep(row);
            removed += usize::from(!kept);
            kept
        });
        removed
    }

    fn remove_forum_rows(&self, keep: impl Fn(&(Uuid, Uuid)) -> bool) -> usize {
        let mut removed = 0;
        self.forum_rows.retain(|key| {
            let kept = keep(key);
            removed += usize::from(!kept);
            kept
        });
        removed
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn has_forum_subscription(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.forum_rows.contains(&(user_id, forum_id)))
    }

    async fn insert_forum_subscription(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.forum_rows.insert((user_id, forum_id)))
    }

    async fn delete_forum_subscription(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.forum_rows.remove(&(user_id, forum_id)).is_some())
    }

    async fn forum_subscribers(&self, forum_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        Ok(self
            .forum_rows
            .iter()
            .filter(|key| key.1 == forum_id)
            .map(|key| key.0)
            .collect())
    }

    async fn get_discussion_subscription(
        &self,
        user_id: Uuid,
        discussion_id: Uuid,
    ) -> anyhow::Result<Option<DiscussionSubscription>> {
        Ok(self
            .discussion_rows
            .get(&(user_id, discussion_id))
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_discussion_subscription(&self, row: DiscussionSubscription) -> anyhow::Result<bool> {
        let key = (row.user_id, row.discussion_id);
        let unchanged = self
            .discussion_rows
            .get(&key)
            .is_some_and(|existing| existing.preference == row.preference);
        if unchanged {
            return Ok(false);
        }
        trace!(user_id = %row.user_id, discussion_id = %row.discussion_id, preference = ?row.preference, "upsert");
        self.discussion_rows.insert(key, row);
        Ok(true)
    }

    async fn delete_discussion_subscription(&self, user_id: Uuid, discussion_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.discussion_rows.remove(&(user_id, discussion_id)).is_some())
    }

    async fn discussion_overrides(
        &self,
        user_id: Uuid,
        forum_id: Uuid,
    ) -> anyhow::Result<Vec<(Uuid, DiscussionPreference)>> {
        Ok(self
            .discussion_rows
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.forum_id == forum_id)
            .map(|entry| (entry.discussion_id, entry.preference))
            .collect())
    }

    async fn overrides_for_discussion(
        &self,
        discussion_id: Uuid,
    ) -> anyhow::Result<Vec<(Uuid, DiscussionPreference)>> {
        Ok(self
            .discussion_rows
            .iter()
            .filter(|entry| entry.discussion_id == discussion_id)
            .map(|entry| (entry.user_id, entry.preference))
            .collect())
    }

    async fn delete_discussion_overrides(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<usize> {
        Ok(self.remove_discussion_rows(|row| !(row.user_id == user_id && row.forum_id == forum_id)))
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<usize> {
        let forum_rows = self.remove_forum_rows(|key| key.0 != user_id);
        Ok(forum_rows + self.remove_discussion_rows(|row| row.user_id != user_id))
    }

    async fn delete_all_for_forum(&self, forum_id: Uuid) -> anyhow::Result<usize> {
        let forum_rows = self.remove_forum_rows(|key| key.1 != forum_id);
        Ok(forum_rows + self.remove_discussion_rows(|row| row.forum_id != forum_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user_id: Uuid, forum_id: Uuid, preference: DiscussionPreference) -> DiscussionSubscription {
        DiscussionSubscription {
            user_id,
            forum_id,
            discussion_id: Uuid::now_v7(),
            preference,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_discussion_updates() {
        let repo = InMemoryDiscussionRepo::new();
        let forum_id = Uuid::now_v7();
        let disc = Discussion::new(Uuid::now_v7(), forum_id, Uuid::now_v7(), Utc::now());
        repo.insert(disc.clone());
        repo.insert(Discussion::new(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), Utc::now()));

        assert!(repo.set_pinned(disc.id, true).await.unwrap());
        assert!(!repo.set_pinned(Uuid::now_v7(), true).await.unwrap());

        let listed = repo.list_for_forum(forum_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].pinned);
    }

    #[tokio::test]
    async fn test_forum_rows_report_changes() {
        let repo = InMemorySubscriptionRepo::new();
        let (user, forum) = (Uuid::now_v7(), Uuid::now_v7());

        assert!(repo.insert_forum_subscription(user, forum).await.unwrap());
        assert!(!repo.insert_forum_subscription(user, forum).await.unwrap());
        assert_eq!(repo.forum_subscribers(forum).await.unwrap(), vec![user]);
        assert!(repo.delete_forum_subscription(user, forum).await.unwrap());
        assert!(!repo.delete_forum_subscription(user, forum).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_skips_identical_preference() {
        let repo = InMemorySubscriptionRepo::new();
        let first = row(Uuid::now_v7(), Uuid::now_v7(), DiscussionPreference::Subscribed);

        assert!(repo.upsert_discussion_subscription(first.clone()).await.unwrap());
        assert!(!repo.upsert_discussion_subscription(first.clone()).await.unwrap());

        let flipped = DiscussionSubscription {
            preference: DiscussionPreference::Unsubscribed,
            ..first.clone()
        };
        assert!(repo.upsert_discussion_subscription(flipped).await.unwrap());
        let stored = repo
            .get_discussion_subscription(first.user_id, first.discussion_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.preference, DiscussionPreference::Unsubscribed);
    }

    #[test]
    fn test_bulk_deletes() {
        tokio_test::block_on(async {
            let repo = InMemorySubscriptionRepo::new();
            let (user, other, forum, other_forum) =
                (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

            repo.insert_forum_subscription(user, forum).await.unwrap();
            repo.insert_forum_subscription(user, other_forum).await.unwrap();
            repo.insert_forum_subscription(other, forum).await.unwrap();
            for r in [
                row(user, forum, DiscussionPreference::Subscribed),
                row(user, forum, DiscussionPreference::Unsubscribed),
                row(user, other_forum, DiscussionPreference::Subscribed),
                row(other, forum, DiscussionPreference::Subscribed),
            ] {
                repo.upsert_discussion_subscription(r).await.unwrap();
            }

            assert_eq!(repo.delete_discussion_overrides(user, forum).await.unwrap(), 2);
            assert_eq!(repo.delete_all_for_forum(other_forum).await.unwrap(), 2);
            assert_eq!(repo.delete_all_for_user(other).await.unwrap(), 2);
            assert_eq!(repo.forum_row_count(), 1);
            assert!(repo.discussion_rows_for(user).is_empty());
        });
    }

    #[test]
    fn test_bulk_delete_counts_survive_concurrent_inserts() {
        let repo = InMemorySubscriptionRepo::new();
        let (leaving, staying, forum) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        for round in 0..50 {
            tokio_test::block_on(async {
                for _ in 0..3 {
                    repo.upsert_discussion_subscription(row(leaving, forum, DiscussionPreference::Subscribed))
                        .await
                        .unwrap();
                }
                repo.insert_forum_subscription(leaving, forum).await.unwrap();
            });

            let removed = std::thread::scope(|s| {
                s.spawn(|| {
                    tokio_test::block_on(async {
                        for _ in 0..20 {
                            repo.upsert_discussion_subscription(row(staying, forum, DiscussionPreference::Subscribed))
                                .await
                                .unwrap();
                        }
                    })
                });
                tokio_test::block_on(repo.delete_all_for_user(leaving)).unwrap()
            });

            assert_eq!(removed, 4, "round {round}");
        }
        assert_eq!(repo.discussion_rows_for(staying).len(), 50 * 20);
    }
}
