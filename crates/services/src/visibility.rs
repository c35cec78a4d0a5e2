//! Which discussions a viewer may see.
//!
//! Two independent filters: the timed-post window and separate-groups
//! isolation. Each is bypassed by its own override capability.

use domains::models::{Discussion, Forum, GroupMode, VisibilityContext};

/// Forum settings the visibility rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityRules {
    pub timed_posts: bool,
    pub group_mode: GroupMode,
}

impl VisibilityRules {
    pub fn for_forum(forum: &Forum) -> Self {
        Self {
            timed_posts: forum.timed_posts,
            group_mode: forum.group_mode,
        }
    }

    pub fn is_visible(&self, discussion: &Discussion, viewer: &VisibilityContext) -> bool {
        self.passes_timed_filter(discussion, viewer) && self.passes_group_filter(discussion, viewer)
    }

    fn passes_timed_filter(&self, discussion: &Discussion, viewer: &VisibilityContext) -> bool {
        if !self.timed_posts || viewer.view_hidden_timed_posts {
            return true;
        }
        // Authors always see their own discussions
        discussion.user_id == viewer.user_id || discussion.is_within_window(viewer.now)
    }

    fn passes_group_filter(&self, discussion: &Discussion, viewer: &VisibilityContext) -> bool {
        if self.group_mode != GroupMode::Separate || viewer.access_all_groups {
            return true;
        }
        match discussion.group_id {
            None => true,
            Some(group) => {
                viewer.is_member_of(group) && viewer.active_group.map_or(true, |active| active == group)
            }
        }
    }
}
