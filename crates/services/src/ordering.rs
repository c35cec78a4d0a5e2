//! # Discussion ordering
//!
//! Ranks the discussions of one forum for listings and for the
//! previous/next navigation shown on a discussion page.
//!
//! The rank is `(pinned, activity, id)` compared ascending: pinned
//! discussions outrank every unpinned one, activity is the last
//! modification (or the opening post in blog-like forums) and the id breaks
//! ties. Listings show the highest rank first.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use domains::models::{Discussion, Forum, VisibilityContext};
use tracing::debug;
use uuid::Uuid;

use crate::visibility::VisibilityRules;

/// The discussions adjacent to a target in rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbours {
    /// Next older discussion (listed right after the target)
    pub prev: Option<Discussion>,
    /// Next newer discussion (listed right before the target)
    pub next: Option<Discussion>,
}

type Rank = (bool, DateTime<Utc>, Uuid);

/// Ordering and neighbour lookup for a single forum.
#[derive(Debug, Clone)]
pub struct DiscussionOrderingEngine {
    forum_id: Uuid,
    blog_like: bool,
    rules: VisibilityRules,
}

impl DiscussionOrderingEngine {
    pub fn new(forum: &Forum) -> Self {
        Self {
            forum_id: forum.id,
            blog_like: forum.is_blog_like(),
            rules: VisibilityRules::for_forum(forum),
        }
    }

    pub fn is_visible(&self, discussion: &Discussion, viewer: &VisibilityContext) -> bool {
        self.rules.is_visible(discussion, viewer)
    }

    /// Visible discussions, most prominent first.
    ///
    /// # Panics
    /// If any discussion belongs to another forum.
    pub fn order(&self, discussions: &[Discussion], viewer: &VisibilityContext) -> Vec<Discussion> {
        let mut visible: Vec<Discussion> = discussions
            .iter()
            .inspect(|d| self.assert_owned(d))
            .filter(|d| self.rules.is_visible(d, viewer))
            .cloned()
            .collect();
        visible.sort_by(|a, b| self.compare(b, a));

        debug!(
            forum_id = %self.forum_id,
            total = discussions.len(),
            visible = visible.len(),
            "ordered discussions"
        );
        visible
    }

    /// Locates the visible discussions ranked immediately around `target`.
    ///
    /// The target itself does not have to be visible to the viewer.
    ///
    /// # Panics
    /// If `target` or any discussion belongs to another forum.
    pub fn neighbours(
        &self,
        discussions: &[Discussion],
        target: &Discussion,
        viewer: &VisibilityContext,
    ) -> Neighbours {
        self.assert_owned(target);
        let target_rank = self.rank(target);

        let mut neighbours = Neighbours::default();
        for candidate in discussions {
            self.assert_owned(candidate);
            if candidate.id == target.id || !self.rules.is_visible(candidate, viewer) {
                continue;
            }
            let rank = self.rank(candidate);
            match rank.cmp(&target_rank) {
                Ordering::Less => {
                    if neighbours.prev.as_ref().map_or(true, |p| rank > self.rank(p)) {
                        neighbours.prev = Some(candidate.clone());
                    }
                }
                Ordering::Greater => {
                    if neighbours.next.as_ref().map_or(true, |n| rank < self.rank(n)) {
                        neighbours.next = Some(candidate.clone());
                    }
                }
                // Same id is the only way to tie on the full rank
                Ordering::Equal => {}
            }
        }
        neighbours
    }

    fn rank(&self, discussion: &Discussion) -> Rank {
        let activity = if self.blog_like {
            discussion.first_post_created
        } else {
            discussion.time_modified
        };
        (discussion.pinned, activity, discussion.id)
    }

    fn compare(&self, a: &Discussion, b: &Discussion) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    fn assert_owned(&self, discussion: &Discussion) {
        assert_eq!(
            discussion.forum_id, self.forum_id,
            "discussion {} belongs to forum {}, not to forum {}",
            discussion.id, discussion.forum_id, self.forum_id
        );
    }
}
