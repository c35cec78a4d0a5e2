use domains::models::{DiscussionPreference, SubscriptionMode};
use integration_tests::Harness;
use services::SubscriptionStateMachine;
use uuid::Uuid;

#[tokio::test]
async fn choose_forum_discussion_subscription_writes_only_an_override() {
    let h = Harness::new();
    let forum = h.forum(SubscriptionMode::Choose);
    let user = h.user();
    let discussion = h.discussion(&forum, 1, 1);

    assert!(!h.subscriptions.is_subscribed(user, &forum, Some(discussion.id)).await.unwrap());

    assert!(h.subscriptions.subscribe_user(user, &forum, Some(discussion.id), true).await.unwrap());
    assert!(h.subscriptions.is_subscribed(user, &forum, Some(discussion.id)).await.unwrap());
    assert!(!h.subscriptions.is_subscribed(user, &forum, None).await.unwrap());

    let rows = h.subscription_rows.discussion_rows_for(user);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].discussion_id, discussion.id);
    assert_eq!(rows[0].preference, DiscussionPreference::Subscribed);
    assert_eq!(h.subscription_rows.forum_row_count(), 0);
}

#[tokio::test]
async fn subscribing_to_a_discussion_of_a_followed_forum_is_a_noop() {
    let h = Harness::new();
    let forum = h.forum(SubscriptionMode::Choose);
    let user = h.user();
    let discussion = h.discussion(&forum, 1, 1);

    assert!(h.subscriptions.subscribe_user(user, &forum, None, true).await.unwrap());
    assert!(!h.subscriptions.subscribe_user(user, &forum, Some(discussion.id), true).await.unwrap());
    assert!(h.subscription_rows.discussion_rows_for(user).is_empty());
}

#[tokio::test]
async fn unsubscribing_twice_reports_no_change_the_second_time() {
    for cache_enabled in [true, false] {
        let h = Harness::with_cache(cache_enabled);
        let forum = h.forum(SubscriptionMode::Choose);
        let user = h.user();
        let discussion = h.discussion(&forum, 1, 1);

        assert!(h.subscriptions.subscribe_user(user, &forum, Some(discussion.id), false).await.unwrap());
        assert!(h.subscriptions.unsubscribe_user(user, &forum, Some(discussion.id), false).await.unwrap());
        assert!(!h.subscriptions.unsubscribe_user(user, &forum, Some(discussion.id), false).await.unwrap());
        assert!(!h.subscriptions.is_subscribed(user, &forum, Some(discussion.id)).await.unwrap());
    }
}

#[tokio::test]
async fn discussion_opt_out_inside_a_followed_forum() {
    let h = Harness::new();
    let forum = h.forum(SubscriptionMode::Initial);
    let user = h.user();
    let quiet = h.discussion(&forum, 1, 1);
    let busy = h.discussion(&forum, 2, 2);

    h.subscriptions.subscribe_user(user, &forum, None, false).await.unwrap();
    assert!(h.subscriptions.unsubscribe_user(user, &forum, Some(quiet.id), true).await.unwrap());

    assert!(!h.subscriptions.is_subscribed(user, &forum, Some(quiet.id)).await.unwrap());
    assert!(h.subscriptions.is_subscribed(user, &forum, Some(busy.id)).await.unwrap());
    assert!(h.subscriptions.discussion_subscribers(&forum, quiet.id).await.unwrap().is_empty());
    assert_eq!(h.subscriptions.discussion_subscribers(&forum, busy.id).await.unwrap(), vec![user]);

    // Opting back in removes the override instead of writing a second one
    assert!(h.subscriptions.subscribe_user(user, &forum, Some(quiet.id), true).await.unwrap());
    assert!(h.subscription_rows.discussion_rows_for(user).is_empty());
    assert!(h.subscriptions.is_subscribed(user, &forum, Some(quiet.id)).await.unwrap());
}

#[tokio::test]
async fn user_requested_forum_actions_reset_overrides() {
    let h = Harness::new();
    let forum = h.forum(SubscriptionMode::Choose);
    let user = h.user();
    let a = h.discussion(&forum, 1, 1);
    let b = h.discussion(&forum, 2, 2);

    h.subscriptions.subscribe_user(user, &forum, Some(a.id), true).await.unwrap();
    h.subscriptions.subscribe_user(user, &forum, Some(b.id), true).await.unwrap();
    assert_eq!(h.subscription_rows.discussion_rows_for(user).len(), 2);

    // On the user's behalf: overrides survive
    assert!(h.subscriptions.subscribe_user(user, &forum, None, false).await.unwrap());
    h.subscriptions.unsubscribe_user(user, &forum, Some(a.id), false).await.unwrap();
    assert_eq!(h.subscription_rows.discussion_rows_for(user).len(), 2);

    // Asked by the user: overrides are wiped
    assert!(!h.subscriptions.subscribe_user(user, &forum, None, true).await.unwrap());
    assert!(h.subscription_rows.discussion_rows_for(user).is_empty());
    assert!(h.subscriptions.is_subscribed(user, &forum, Some(a.id)).await.unwrap());

    h.subscriptions.unsubscribe_user(user, &forum, Some(b.id), false).await.unwrap();
    assert!(h.subscriptions.unsubscribe_user(user, &forum, None, true).await.unwrap());
    assert!(h.subscription_rows.discussion_rows_for(user).is_empty());
    assert!(!h.subscriptions.is_subscribed(user, &forum, Some(b.id)).await.unwrap());
}

#[tokio::test]
async fn forced_and_disallowed_ignore_stale_overrides() {
    let h = Harness::new();
    let mut forum = h.forum(SubscriptionMode::Choose);
    let user = h.user();
    let discussion = h.discussion(&forum, 1, 1);

    h.subscriptions.subscribe_user(user, &forum, None, false).await.unwrap();
    h.subscriptions.unsubscribe_user(user, &forum, Some(discussion.id), false).await.unwrap();

    forum.subscription_mode = SubscriptionMode::Forced;
    assert!(h.subscriptions.is_subscribed(user, &forum, Some(discussion.id)).await.unwrap());
    assert_eq!(h.subscriptions.discussion_subscribers(&forum, discussion.id).await.unwrap(), vec![user]);

    h.directory.prohibit_force_subscribe(user, forum.id);
    assert!(!h.subscriptions.is_subscribed(user, &forum, None).await.unwrap());

    forum.subscription_mode = SubscriptionMode::Disallowed;
    assert!(!h.subscriptions.is_subscribed(user, &forum, Some(discussion.id)).await.unwrap());
    assert!(h.subscriptions.subscribers(&forum).await.unwrap().is_empty());
}

#[tokio::test]
async fn enrolment_subscribes_to_initial_forums_only() {
    let h = Harness::new();
    let initial = h.forum(SubscriptionMode::Initial);
    let choose = h.forum(SubscriptionMode::Choose);
    let user = h.user();

    let forums = [initial.clone(), choose.clone()];
    assert_eq!(h.subscriptions.on_user_enrolled(user, &forums).await.unwrap(), 1);
    assert!(h.subscriptions.is_subscribed(user, &initial, None).await.unwrap());
    assert!(!h.subscriptions.is_subscribed(user, &choose, None).await.unwrap());
    assert_eq!(h.subscriptions.subscribers(&initial).await.unwrap(), vec![user]);

    let discussion = h.discussion(&initial, 1, 1);
    h.subscriptions.unsubscribe_user(user, &initial, Some(discussion.id), false).await.unwrap();
    assert_eq!(h.subscriptions.on_user_unenrolled(user, &forums).await.unwrap(), 2);
    assert!(!h.subscriptions.is_subscribed(user, &initial, None).await.unwrap());
    assert!(h.subscription_rows.discussion_rows_for(user).is_empty());
}

#[tokio::test]
async fn cache_never_outlives_a_mutation() {
    let h = Harness::new();
    let forum = h.forum(SubscriptionMode::Choose);
    let user = h.user();
    let discussion = h.discussion(&forum, 1, 1);

    // Warm both caches
    assert!(!h.subscriptions.is_subscribed(user, &forum, Some(discussion.id)).await.unwrap());
    assert!(h.subscriptions.discussion_overrides(user, forum.id).await.unwrap().is_empty());

    h.subscriptions.subscribe_user(user, &forum, Some(discussion.id), true).await.unwrap();
    let overrides = h.subscriptions.discussion_overrides(user, forum.id).await.unwrap();
    assert_eq!(overrides.get(&discussion.id), Some(&DiscussionPreference::Subscribed));

    h.subscriptions.subscribe_user(user, &forum, None, true).await.unwrap();
    assert_eq!(h.subscriptions.subscribers(&forum).await.unwrap(), vec![user]);
    assert!(h.subscriptions.discussion_overrides(user, forum.id).await.unwrap().is_empty());

    h.subscriptions.reset_caches();
    assert!(h.subscriptions.cache().forum_subscribers(forum.id).is_none());
}

#[test]
fn new_posts_default_to_subscribed_in_choose_forums() {
    let h = Harness::new();
    let poster = domains::models::PosterCapabilities::participant();
    let choose = h.forum(SubscriptionMode::Choose);

    assert!(SubscriptionStateMachine::user_default_subscription(&choose, &poster, Some(Uuid::now_v7())));
    assert!(!SubscriptionStateMachine::user_default_subscription(
        &h.forum(SubscriptionMode::Disallowed),
        &poster,
        None
    ));
}
