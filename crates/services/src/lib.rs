//! # services
//!
//! Business logic of the peerforum core: discussion ordering and navigation,
//! visibility rules and the subscription state machine. Storage is reached
//! only through the ports defined in `domains`.

pub mod cache;
pub mod discussions;
pub mod ordering;
pub mod subscriptions;
pub mod visibility;

pub use cache::{CacheKey, SubscriptionCache};
pub use discussions::DiscussionService;
pub use ordering::{DiscussionOrderingEngine, Neighbours};
pub use subscriptions::SubscriptionStateMachine;
pub use visibility::VisibilityRules;
