//! # Subscription state machine
//!
//! Resolves and mutates forum-level subscriptions and per-discussion
//! overrides. The forum's [`SubscriptionMode`] decides how much of the
//! stored state matters:
//!
//! | mode         | forum level                        | discussion overrides |
//! |--------------|------------------------------------|----------------------|
//! | `Forced`     | subscribed unless permission denies | ignored             |
//! | `Disallowed` | never subscribed                   | ignored              |
//! | `Choose`     | forum row present                  | applied              |
//! | `Initial`    | forum row present                  | applied              |
//!
//! Overrides left behind after a mode change stay in storage and are simply
//! not consulted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use domains::error::Result;
use domains::models::{
    DiscussionPreference, DiscussionSubscription, Forum, PosterCapabilities, SubscriptionMode,
};
use domains::ports::{SubscriptionRepo, ViewerDirectory};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheKey, SubscriptionCache};

pub struct SubscriptionStateMachine {
    repo: Arc<dyn SubscriptionRepo>,
    directory: Arc<dyn ViewerDirectory>,
    cache: SubscriptionCache,
}

impl SubscriptionStateMachine {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        directory: Arc<dyn ViewerDirectory>,
        cache: SubscriptionCache,
    ) -> Self {
        Self { repo, directory, cache }
    }

    pub fn cache(&self) -> &SubscriptionCache {
        &self.cache
    }

    pub fn reset_caches(&self) {
        self.cache.reset();
    }

    pub fn is_forcesubscribed(forum: &Forum) -> bool {
        forum.subscription_mode == SubscriptionMode::Forced
    }

    pub fn subscription_disabled(forum: &Forum) -> bool {
        forum.subscription_mode == SubscriptionMode::Disallowed
    }

    /// Whether the user gets a choice at all in this forum.
    pub fn is_subscribable(forum: &Forum, poster: &PosterCapabilities) -> bool {
        poster.is_participant()
            && !Self::is_forcesubscribed(forum)
            && !Self::subscription_disabled(forum)
    }

    /// Effective subscription of `user_id` to the forum, or to one of its
    /// discussions when `discussion_id` is given.
    pub async fn is_subscribed(
        &self,
        user_id: Uuid,
        forum: &Forum,
        discussion_id: Option<Uuid>,
    ) -> Result<bool> {
        let forum_level = self.forum_level(user_id, forum).await?;
        let discussion_id = match discussion_id {
            Some(id) if Self::honours_overrides(forum) => id,
            _ => return Ok(forum_level),
        };

        let resolved = match self.cached_override(user_id, forum.id, discussion_id).await? {
            Some(DiscussionPreference::Subscribed) => true,
            Some(DiscussionPreference::Unsubscribed) => false,
            None => forum_level,
        };
        debug!(
            %user_id,
            forum_id = %forum.id,
            %discussion_id,
            forum_level,
            resolved,
            "resolved discussion subscription"
        );
        Ok(resolved)
    }

    /// Subscribes to the whole forum, or to a single discussion.
    ///
    /// A forum-level call made on the user's own request also clears every
    /// discussion override the user holds in the forum.
    pub async fn subscribe_user(
        &self,
        user_id: Uuid,
        forum: &Forum,
        discussion_id: Option<Uuid>,
        user_request: bool,
    ) -> Result<bool> {
        let changed = match discussion_id {
            None => {
                let inserted = self.repo.insert_forum_subscription(user_id, forum.id).await?;
                if user_request {
                    self.clear_overrides(user_id, forum.id).await?;
                }
                self.cache.invalidate(CacheKey::Forum(forum.id));
                inserted
            }
            Some(discussion_id) => self.subscribe_to_discussion(user_id, forum, discussion_id).await?,
        };

        info!(
            %user_id,
            forum_id = %forum.id,
            discussion_id = ?discussion_id,
            user_request,
            changed,
            "subscribe"
        );
        Ok(changed)
    }

    /// Mirror image of [`subscribe_user`](Self::subscribe_user).
    pub async fn unsubscribe_user(
        &self,
        user_id: Uuid,
        forum: &Forum,
        discussion_id: Option<Uuid>,
        user_request: bool,
    ) -> Result<bool> {
        let changed = match discussion_id {
            None => {
                let removed = self.repo.delete_forum_subscription(user_id, forum.id).await?;
                if user_request {
                    self.clear_overrides(user_id, forum.id).await?;
                }
                self.cache.invalidate(CacheKey::Forum(forum.id));
                removed
            }
            Some(discussion_id) => {
                self.unsubscribe_from_discussion(user_id, forum, discussion_id).await?
            }
        };

        info!(
            %user_id,
            forum_id = %forum.id,
            discussion_id = ?discussion_id,
            user_request,
            changed,
            "unsubscribe"
        );
        Ok(changed)
    }

    /// Whether the author of a new post or discussion starts subscribed.
    ///
    /// `Choose` defaults to subscribed here just like `Initial`, unlike the
    /// general effective state where `Choose` starts unsubscribed.
    pub fn user_default_subscription(
        forum: &Forum,
        poster: &PosterCapabilities,
        discussion_id: Option<Uuid>,
    ) -> bool {
        let subscribed = if !poster.is_participant() {
            false
        } else {
            match forum.subscription_mode {
                SubscriptionMode::Disallowed => false,
                SubscriptionMode::Forced | SubscriptionMode::Choose | SubscriptionMode::Initial => true,
            }
        };
        debug!(forum_id = %forum.id, discussion_id = ?discussion_id, subscribed, "default subscription");
        subscribed
    }

    /// Users subscribed to the forum as a whole.
    pub async fn subscribers(&self, forum: &Forum) -> Result<Vec<Uuid>> {
        let mut users: Vec<Uuid> = match forum.subscription_mode {
            SubscriptionMode::Disallowed => Vec::new(),
            SubscriptionMode::Forced => {
                let mut allowed = Vec::new();
                for user_id in self.directory.enrolled_users(forum.course_id).await? {
                    if self.directory.allow_force_subscribe(user_id, forum.id).await? {
                        allowed.push(user_id);
                    }
                }
                allowed
            }
            SubscriptionMode::Choose | SubscriptionMode::Initial => {
                self.forum_rows(forum.id).await?.into_iter().collect()
            }
        };
        users.sort();
        Ok(users)
    }

    /// Users who would be notified about a post in `discussion_id`.
    pub async fn discussion_subscribers(&self, forum: &Forum, discussion_id: Uuid) -> Result<Vec<Uuid>> {
        if !Self::honours_overrides(forum) {
            return self.subscribers(forum).await;
        }

        let mut users: HashSet<Uuid> = self.forum_rows(forum.id).await?;
        for (user_id, preference) in self.repo.overrides_for_discussion(discussion_id).await? {
            match preference {
                DiscussionPreference::Subscribed => users.insert(user_id),
                DiscussionPreference::Unsubscribed => users.remove(&user_id),
            };
        }
        let mut users: Vec<Uuid> = users.into_iter().collect();
        users.sort();
        Ok(users)
    }

    /// Every override the user holds in the forum, keyed by discussion.
    pub async fn discussion_overrides(
        &self,
        user_id: Uuid,
        forum_id: Uuid,
    ) -> Result<HashMap<Uuid, DiscussionPreference>> {
        if let Some(hit) = self.cache.overrides(user_id, forum_id) {
            return Ok(hit);
        }
        let seen = self.cache.generation();
        let overrides: HashMap<Uuid, DiscussionPreference> = self
            .repo
            .discussion_overrides(user_id, forum_id)
            .await?
            .into_iter()
            .collect();
        self.cache.store_overrides(user_id, forum_id, overrides.clone(), seen);
        Ok(overrides)
    }

    /// Enrolment hook: subscribes the user to every `Initial` forum.
    pub async fn on_user_enrolled(&self, user_id: Uuid, forums: &[Forum]) -> Result<usize> {
        let mut subscribed = 0;
        for forum in forums.iter().filter(|f| f.subscription_mode == SubscriptionMode::Initial) {
            if self.subscribe_user(user_id, forum, None, false).await? {
                subscribed += 1;
            }
        }
        Ok(subscribed)
    }

    /// Unenrolment hook: drops forum rows and overrides in the given forums.
    pub async fn on_user_unenrolled(&self, user_id: Uuid, forums: &[Forum]) -> Result<usize> {
        let mut removed = 0;
        for forum in forums {
            if self.repo.delete_forum_subscription(user_id, forum.id).await? {
                removed += 1;
            }
            removed += self.repo.delete_discussion_overrides(user_id, forum.id).await?;
            self.cache.invalidate(CacheKey::Forum(forum.id));
        }
        info!(%user_id, forums = forums.len(), removed, "unenrolled");
        Ok(removed)
    }

    /// Privacy erasure of everything stored about one user.
    pub async fn erase_user(&self, user_id: Uuid) -> Result<usize> {
        let removed = self.repo.delete_all_for_user(user_id).await?;
        self.cache.invalidate(CacheKey::User(user_id));
        info!(%user_id, removed, "erased user subscriptions");
        Ok(removed)
    }

    /// Privacy erasure of every subscription row of one forum.
    pub async fn erase_forum(&self, forum_id: Uuid) -> Result<usize> {
        let removed = self.repo.delete_all_for_forum(forum_id).await?;
        self.cache.invalidate(CacheKey::Forum(forum_id));
        info!(%forum_id, removed, "erased forum subscriptions");
        Ok(removed)
    }

    fn honours_overrides(forum: &Forum) -> bool {
        matches!(
            forum.subscription_mode,
            SubscriptionMode::Choose | SubscriptionMode::Initial
        )
    }

    async fn forum_level(&self, user_id: Uuid, forum: &Forum) -> Result<bool> {
        match forum.subscription_mode {
            SubscriptionMode::Forced => Ok(self.directory.allow_force_subscribe(user_id, forum.id).await?),
            SubscriptionMode::Disallowed => Ok(false),
            SubscriptionMode::Choose | SubscriptionMode::Initial => {
                if self.cache.is_enabled() {
                    Ok(self.forum_rows(forum.id).await?.contains(&user_id))
                } else {
                    Ok(self.repo.has_forum_subscription(user_id, forum.id).await?)
                }
            }
        }
    }

    async fn forum_rows(&self, forum_id: Uuid) -> Result<HashSet<Uuid>> {
        if let Some(hit) = self.cache.forum_subscribers(forum_id) {
            return Ok(hit);
        }
        let seen = self.cache.generation();
        let rows: HashSet<Uuid> = self.repo.forum_subscribers(forum_id).await?.into_iter().collect();
        self.cache.store_forum_subscribers(forum_id, rows.clone(), seen);
        Ok(rows)
    }

    async fn cached_override(
        &self,
        user_id: Uuid,
        forum_id: Uuid,
        discussion_id: Uuid,
    ) -> Result<Option<DiscussionPreference>> {
        if self.cache.is_enabled() {
            let overrides = self.discussion_overrides(user_id, forum_id).await?;
            return Ok(overrides.get(&discussion_id).copied());
        }
        Ok(self
            .repo
            .get_discussion_subscription(user_id, discussion_id)
            .await?
            .map(|row| row.preference))
    }

    /// Mutations read the override straight from storage.
    async fn stored_override(&self, user_id: Uuid, discussion_id: Uuid) -> Result<Option<DiscussionPreference>> {
        Ok(self
            .repo
            .get_discussion_subscription(user_id, discussion_id)
            .await?
            .map(|row| row.preference))
    }

    async fn subscribe_to_discussion(&self, user_id: Uuid, forum: &Forum, discussion_id: Uuid) -> Result<bool> {
        let forum_level = self.forum_level(user_id, forum).await?;
        let existing = self.stored_override(user_id, discussion_id).await?;

        let changed = match (forum_level, existing) {
            (true, Some(DiscussionPreference::Unsubscribed)) => {
                // Inheriting from the forum is enough
                self.repo.delete_discussion_subscription(user_id, discussion_id).await?
            }
            (true, _) | (false, Some(DiscussionPreference::Subscribed)) => false,
            (false, _) => {
                self.write_override(user_id, forum.id, discussion_id, DiscussionPreference::Subscribed)
                    .await?
            }
        };
        self.cache.invalidate(CacheKey::UserForum { user_id, forum_id: forum.id });
        Ok(changed)
    }

    async fn unsubscribe_from_discussion(&self, user_id: Uuid, forum: &Forum, discussion_id: Uuid) -> Result<bool> {
        let forum_level = self.forum_level(user_id, forum).await?;
        let existing = self.stored_override(user_id, discussion_id).await?;

        let changed = match (forum_level, existing) {
            (false, Some(DiscussionPreference::Subscribed)) => {
                self.repo.delete_discussion_subscription(user_id, discussion_id).await?
            }
            (false, _) | (true, Some(DiscussionPreference::Unsubscribed)) => false,
            (true, _) => {
                self.write_override(user_id, forum.id, discussion_id, DiscussionPreference::Unsubscribed)
                    .await?
            }
        };
        self.cache.invalidate(CacheKey::UserForum { user_id, forum_id: forum.id });
        Ok(changed)
    }

    async fn write_override(
        &self,
        user_id: Uuid,
        forum_id: Uuid,
        discussion_id: Uuid,
        preference: DiscussionPreference,
    ) -> Result<bool> {
        let row = DiscussionSubscription {
            user_id,
            forum_id,
            discussion_id,
            preference,
            updated_at: Utc::now(),
        };
        Ok(self.repo.upsert_discussion_subscription(row).await?)
    }

    async fn clear_overrides(&self, user_id: Uuid, forum_id: Uuid) -> Result<()> {
        let cleared = self.repo.delete_discussion_overrides(user_id, forum_id).await?;
        self.cache.invalidate(CacheKey::UserForum { user_id, forum_id });
        debug!(%user_id, %forum_id, cleared, "cleared discussion overrides");
        Ok(())
    }
}
