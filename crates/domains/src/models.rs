//! # Domain Models
//!
//! These structs represent the core entities of a peerforum activity.
//! Identifiers are UUID v7, so a higher id is also a newer record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ForumError;

/// Forum flavour. Only `Blog` changes how discussions are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForumKind {
    #[default]
    General,
    Single,
    EachUser,
    QandA,
    News,
    Blog,
}

/// How a forum treats subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionMode {
    /// Optional, unsubscribed until the user opts in.
    #[default]
    Choose,
    /// Everyone is subscribed and cannot opt out.
    Forced,
    /// Optional, subscribed on enrolment.
    Initial,
    /// Nobody can subscribe.
    Disallowed,
}

impl SubscriptionMode {
    /// Stored integer code of the mode.
    pub fn code(self) -> i32 {
        match self {
            SubscriptionMode::Choose => 0,
            SubscriptionMode::Forced => 1,
            SubscriptionMode::Initial => 2,
            SubscriptionMode::Disallowed => 3,
        }
    }
}

impl TryFrom<i32> for SubscriptionMode {
    type Error = ForumError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SubscriptionMode::Choose),
            1 => Ok(SubscriptionMode::Forced),
            2 => Ok(SubscriptionMode::Initial),
            3 => Ok(SubscriptionMode::Disallowed),
            other => Err(ForumError::InvalidSubscriptionMode(other)),
        }
    }
}

/// Group separation applied to a forum's discussions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    #[default]
    None,
    Separate,
    Visible,
}

/// A forum instance inside a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forum {
    pub id: Uuid,
    /// Enrolment scope of the forum
    pub course_id: Uuid,
    pub kind: ForumKind,
    pub subscription_mode: SubscriptionMode,
    pub group_mode: GroupMode,
    /// Whether the `time_start`/`time_end` window of discussions is enforced
    pub timed_posts: bool,
}

impl Forum {
    pub fn new(id: Uuid, course_id: Uuid) -> Self {
        Self {
            id,
            course_id,
            kind: ForumKind::default(),
            subscription_mode: SubscriptionMode::default(),
            group_mode: GroupMode::default(),
            timed_posts: false,
        }
    }

    pub fn with_kind(mut self, kind: ForumKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_subscription_mode(mut self, mode: SubscriptionMode) -> Self {
        self.subscription_mode = mode;
        self
    }

    pub fn with_group_mode(mut self, mode: GroupMode) -> Self {
        self.group_mode = mode;
        self
    }

    pub fn with_timed_posts(mut self, enabled: bool) -> Self {
        self.timed_posts = enabled;
        self
    }

    /// Blog-like forums order discussions by their opening post.
    pub fn is_blog_like(&self) -> bool {
        self.kind == ForumKind::Blog
    }
}

/// A thread: the opening post and its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: Uuid,
    pub forum_id: Uuid,
    /// Author of the opening post
    pub user_id: Uuid,
    /// `None` means the discussion is open to all participants
    pub group_id: Option<Uuid>,
    pub pinned: bool,
    /// Bumped whenever the latest post of the discussion changes
    pub time_modified: DateTime<Utc>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub first_post_created: DateTime<Utc>,
}

impl Discussion {
    /// A fresh, unpinned, unrestricted discussion created at `created`.
    pub fn new(id: Uuid, forum_id: Uuid, user_id: Uuid, created: DateTime<Utc>) -> Self {
        Self {
            id,
            forum_id,
            user_id,
            group_id: None,
            pinned: false,
            time_modified: created,
            time_start: None,
            time_end: None,
            first_post_created: created,
        }
    }

    /// True when `now` falls inside the timed-post window.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        let started = self.time_start.map_or(true, |start| start <= now);
        let not_ended = self.time_end.map_or(true, |end| end > now);
        started && not_ended
    }
}

/// Presence of this row means the user follows the whole forum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForumSubscription {
    pub user_id: Uuid,
    pub forum_id: Uuid,
}

/// Explicit per-discussion choice overriding the forum-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscussionPreference {
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionSubscription {
    pub user_id: Uuid,
    pub forum_id: Uuid,
    pub discussion_id: Uuid,
    pub preference: DiscussionPreference,
    pub updated_at: DateTime<Utc>,
}

/// Who is looking at a forum, and what they are allowed to bypass.
///
/// The host builds one per request from its own session state.
#[derive(Debug, Clone)]
pub struct VisibilityContext {
    pub user_id: Uuid,
    /// May see discussions outside their timed-post window
    pub view_hidden_timed_posts: bool,
    /// May see every group's discussions in separate-groups forums
    pub access_all_groups: bool,
    /// Current group memberships
    pub groups: Vec<Uuid>,
    /// Group picked in the group selector, `None` for "all my groups"
    pub active_group: Option<Uuid>,
    pub now: DateTime<Utc>,
}

impl VisibilityContext {
    /// A regular participant with no group memberships.
    pub fn participant(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            view_hidden_timed_posts: false,
            access_all_groups: false,
            groups: Vec::new(),
            active_group: None,
            now,
        }
    }

    /// A viewer that bypasses both the timed-post and the group filter.
    pub fn admin(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            view_hidden_timed_posts: true,
            access_all_groups: true,
            ..Self::participant(user_id, now)
        }
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = Uuid>) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    pub fn with_active_group(mut self, group: Option<Uuid>) -> Self {
        self.active_group = group;
        self
    }

    pub fn is_member_of(&self, group: Uuid) -> bool {
        self.groups.contains(&group)
    }
}

/// What the creator of a new post is, for the auto-subscribe decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PosterCapabilities {
    pub logged_in: bool,
    pub guest: bool,
}

impl PosterCapabilities {
    pub fn participant() -> Self {
        Self { logged_in: true, guest: false }
    }

    pub fn guest() -> Self {
        Self { logged_in: true, guest: true }
    }

    /// Guests and anonymous visitors never get subscriptions.
    pub fn is_participant(&self) -> bool {
        self.logged_in && !self.guest
    }
}
