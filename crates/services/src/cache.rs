//! Request- or service-scoped caches for subscription lookups.
//!
//! Owned by a `SubscriptionStateMachine` instance, never global. Every
//! mutation of the state machine invalidates the keys it touched.
//!
//! Lookups that miss take a [`generation`](SubscriptionCache::generation)
//! before reading storage and hand it back to `store_*`. Any invalidation in
//! between bumps the generation, and the snapshot is discarded instead of
//! outliving the mutation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use domains::models::DiscussionPreference;
use uuid::Uuid;

/// Which cached entries to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    /// Subscriber rows of one forum and every override cached for it
    Forum(Uuid),
    /// Discussion overrides of one user in one forum
    UserForum { user_id: Uuid, forum_id: Uuid },
    /// Everything cached about one user
    User(Uuid),
}

#[derive(Debug)]
pub struct SubscriptionCache {
    enabled: bool,
    generation: AtomicU64,
    forum_rows: DashMap<Uuid, HashSet<Uuid>>,
    overrides: DashMap<(Uuid, Uuid), HashMap<Uuid, DiscussionPreference>>,
}

impl Default for SubscriptionCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SubscriptionCache {
    /// A disabled cache stores nothing and every lookup misses.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            generation: AtomicU64::new(0),
            forum_rows: DashMap::new(),
            overrides: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Ticket to take before reading the storage a `store_*` call caches.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, seen: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == seen
    }

    pub fn forum_subscribers(&self, forum_id: Uuid) -> Option<HashSet<Uuid>> {
        self.forum_rows.get(&forum_id).map(|entry| entry.value().clone())
    }

    /// Caches a snapshot read after `generation()` returned `seen`.
    pub fn store_forum_subscribers(&self, forum_id: Uuid, users: HashSet<Uuid>, seen: u64) {
        if !self.enabled || !self.is_current(seen) {
            return;
        }
        self.forum_rows.insert(forum_id, users);
        // An invalidation may have slipped in between the check and the insert
        if !self.is_current(seen) {
            self.forum_rows.remove(&forum_id);
        }
    }

    pub fn overrides(&self, user_id: Uuid, forum_id: Uuid) -> Option<HashMap<Uuid, DiscussionPreference>> {
        self.overrides
            .get(&(user_id, forum_id))
            .map(|entry| entry.value().clone())
    }

    pub fn store_overrides(
        &self,
        user_id: Uuid,
        forum_id: Uuid,
        overrides: HashMap<Uuid, DiscussionPreference>,
        seen: u64,
    ) {
        if !self.enabled || !self.is_current(seen) {
            return;
        }
        self.overrides.insert((user_id, forum_id), overrides);
        if !self.is_current(seen) {
            self.overrides.remove(&(user_id, forum_id));
        }
    }

    pub fn invalidate(&self, key: CacheKey) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match key {
            CacheKey::Forum(forum_id) => {
                self.forum_rows.remove(&forum_id);
                self.overrides.retain(|(_, forum), _| *forum != forum_id);
            }
            CacheKey::UserForum { user_id, forum_id } => {
                self.overrides.remove(&(user_id, forum_id));
            }
            CacheKey::User(user_id) => {
                self.overrides.retain(|(user, _), _| *user != user_id);
                // Subscriber sets of every forum may contain the user
                self.forum_rows.clear();
            }
        }
    }

    /// Drops every entry. Used at process and test boundaries.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.forum_rows.clear();
        self.overrides.clear();
    }
}
