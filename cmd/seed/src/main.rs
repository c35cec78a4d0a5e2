//! # seed
//!
//! Builds an in-memory forum, wires the services to it and logs what a
//! participant would see: the ordered listing, the navigation around one
//! discussion and the resulting subscription state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use configs::{LogFormat, Settings};
use domains::models::{Discussion, Forum, SubscriptionMode, VisibilityContext};
use services::{DiscussionService, SubscriptionCache, SubscriptionStateMachine};
use storage_adapters::{InMemoryDiscussionRepo, InMemorySubscriptionRepo, StaticViewerDirectory};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings);

    let course_id = Uuid::now_v7();
    let forum = Forum::new(Uuid::now_v7(), course_id).with_subscription_mode(SubscriptionMode::Initial);
    let author = Uuid::now_v7();
    let reader = Uuid::now_v7();

    let discussions = Arc::new(InMemoryDiscussionRepo::new());
    let start = Utc::now() - Duration::hours(i64::from(settings.seed.discussions));
    let mut seeded = Vec::new();
    for hour in 0..settings.seed.discussions {
        let discussion = Discussion::new(Uuid::now_v7(), forum.id, author, start + Duration::hours(i64::from(hour)));
        seeded.push(discussion.id);
        discussions.insert(discussion);
    }

    let directory = Arc::new(StaticViewerDirectory::new());
    directory.enrol(course_id, author);
    directory.enrol(course_id, reader);

    let listing = DiscussionService::new(discussions.clone());
    let subscriptions = SubscriptionStateMachine::new(
        Arc::new(InMemorySubscriptionRepo::new()),
        directory,
        SubscriptionCache::new(settings.subscriptions.cache_enabled),
    );

    // The oldest discussion becomes sticky
    if let Some(&oldest) = seeded.first() {
        listing.set_pinned(oldest, true).await?;
    }

    let viewer = VisibilityContext::participant(reader, Utc::now());
    for (rank, discussion) in listing.list(&forum, &viewer).await?.iter().enumerate() {
        info!(rank, id = %discussion.id, pinned = discussion.pinned, modified = %discussion.time_modified, "listing");
    }

    if let Some(&middle) = seeded.get(seeded.len() / 2) {
        let around = listing.neighbours(&forum, middle, &viewer).await?;
        info!(
            discussion = %middle,
            prev = ?around.prev.map(|d| d.id),
            next = ?around.next.map(|d| d.id),
            "navigation"
        );

        subscriptions.on_user_enrolled(reader, std::slice::from_ref(&forum)).await?;
        subscriptions.unsubscribe_user(reader, &forum, Some(middle), true).await?;
        let forum_level = subscriptions.is_subscribed(reader, &forum, None).await?;
        let discussion_level = subscriptions.is_subscribed(reader, &forum, Some(middle)).await?;
        let subscribers = subscriptions.discussion_subscribers(&forum, middle).await?;
        info!(forum_level, discussion_level, subscribers = subscribers.len(), "reader subscription");
    }

    Ok(())
}
