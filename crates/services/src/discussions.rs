//! Host-facing listing and maintenance of a forum's discussions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domains::error::{ForumError, Result};
use domains::models::{Discussion, Forum, VisibilityContext};
use domains::ports::DiscussionRepo;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ordering::{DiscussionOrderingEngine, Neighbours};

pub struct DiscussionService {
    repo: Arc<dyn DiscussionRepo>,
}

impl DiscussionService {
    pub fn new(repo: Arc<dyn DiscussionRepo>) -> Self {
        Self { repo }
    }

    /// The discussions of `forum` the viewer may see, most prominent first.
    pub async fn list(&self, forum: &Forum, viewer: &VisibilityContext) -> Result<Vec<Discussion>> {
        let discussions = self.repo.list_for_forum(forum.id).await?;
        Ok(DiscussionOrderingEngine::new(forum).order(&discussions, viewer))
    }

    /// Previous/next navigation for one discussion page.
    ///
    /// A discussion the viewer may not see is reported as not found, the
    /// same as a missing one.
    ///
    /// # Panics
    /// If the discussion exists but belongs to another forum.
    pub async fn neighbours(
        &self,
        forum: &Forum,
        discussion_id: Uuid,
        viewer: &VisibilityContext,
    ) -> Result<Neighbours> {
        let target = self.load(discussion_id).await?;
        let engine = DiscussionOrderingEngine::new(forum);
        if target.forum_id == forum.id && !engine.is_visible(&target, viewer) {
            debug!(%discussion_id, user_id = %viewer.user_id, "navigation refused for hidden discussion");
            return Err(not_found(discussion_id));
        }
        let discussions = self.repo.list_for_forum(forum.id).await?;
        Ok(engine.neighbours(&discussions, &target, viewer))
    }

    /// Fetches one discussion, refusing it when the viewer may not see it.
    pub async fn get_visible(
        &self,
        forum: &Forum,
        discussion_id: Uuid,
        viewer: &VisibilityContext,
    ) -> Result<Option<Discussion>> {
        let discussion = self.load(discussion_id).await?;
        let engine = DiscussionOrderingEngine::new(forum);
        Ok(engine.is_visible(&discussion, viewer).then_some(discussion))
    }

    pub async fn set_pinned(&self, discussion_id: Uuid, pinned: bool) -> Result<()> {
        let found = self.repo.set_pinned(discussion_id, pinned).await?;
        self.require(found, discussion_id)?;
        info!(%discussion_id, pinned, "pin state changed");
        Ok(())
    }

    /// Records new activity. Any value is accepted, including one older than
    /// the stored time (administrative corrections).
    pub async fn touch(&self, discussion_id: Uuid, time_modified: DateTime<Utc>) -> Result<()> {
        let found = self.repo.set_time_modified(discussion_id, time_modified).await?;
        self.require(found, discussion_id)
    }

    pub async fn set_group(&self, discussion_id: Uuid, group_id: Option<Uuid>) -> Result<()> {
        let found = self.repo.set_group(discussion_id, group_id).await?;
        self.require(found, discussion_id)?;
        info!(%discussion_id, group_id = ?group_id, "group changed");
        Ok(())
    }

    pub async fn set_time_window(
        &self,
        discussion_id: Uuid,
        time_start: Option<DateTime<Utc>>,
        time_end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let (Some(start), Some(end)) = (time_start, time_end) {
            if end <= start {
                return Err(ForumError::Validation(format!(
                    "display period of discussion {discussion_id} ends before it starts"
                )));
            }
        }
        let found = self.repo.set_time_window(discussion_id, time_start, time_end).await?;
        self.require(found, discussion_id)
    }

    async fn load(&self, discussion_id: Uuid) -> Result<Discussion> {
        self.repo
            .get(discussion_id)
            .await?
            .ok_or_else(|| not_found(discussion_id))
    }

    fn require(&self, found: bool, discussion_id: Uuid) -> Result<()> {
        if found {
            Ok(())
        } else {
            Err(not_found(discussion_id))
        }
    }
}

fn not_found(discussion_id: Uuid) -> ForumError {
    ForumError::NotFound("Discussion".into(), discussion_id.to_string())
}
