//! Static `ViewerDirectory` fed by the host at startup or by tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use domains::ports::ViewerDirectory;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct StaticViewerDirectory {
    enrolments: DashMap<Uuid, Vec<Uuid>>,
    /// `(user, forum)` pairs whose force-subscribe permission is prohibited
    prohibited: DashSet<(Uuid, Uuid)>,
}

impl StaticViewerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enrol(&self, course_id: Uuid, user_id: Uuid) {
        let mut users = self.enrolments.entry(course_id).or_default();
        if !users.contains(&user_id) {
            users.push(user_id);
        }
    }

    pub fn unenrol(&self, course_id: Uuid, user_id: Uuid) {
        if let Some(mut users) = self.enrolments.get_mut(&course_id) {
            users.retain(|u| *u != user_id);
        }
    }

    pub fn prohibit_force_subscribe(&self, user_id: Uuid, forum_id: Uuid) {
        self.prohibited.insert((user_id, forum_id));
    }
}

#[async_trait]
impl ViewerDirectory for StaticViewerDirectory {
    async fn allow_force_subscribe(&self, user_id: Uuid, forum_id: Uuid) -> anyhow::Result<bool> {
        Ok(!self.prohibited.contains(&(user_id, forum_id)))
    }

    async fn enrolled_users(&self, course_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        Ok(self
            .enrolments
            .get(&course_id)
            .map(|users| users.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enrolment_and_prohibition() {
        let directory = StaticViewerDirectory::new();
        let (course, user, forum) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        directory.enrol(course, user);
        directory.enrol(course, user);
        assert_eq!(directory.enrolled_users(course).await.unwrap(), vec![user]);

        assert!(directory.allow_force_subscribe(user, forum).await.unwrap());
        directory.prohibit_force_subscribe(user, forum);
        assert!(!directory.allow_force_subscribe(user, forum).await.unwrap());

        directory.unenrol(course, user);
        assert!(directory.enrolled_users(course).await.unwrap().is_empty());
    }
}
