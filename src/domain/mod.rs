// Pure types and rules. No I/O in here.
pub mod calendar;
pub mod mood;
pub mod notifications;
pub mod post;
pub mod reaction;

pub use calendar::{DatedMood, ProfileStats};
pub use mood::Mood;
pub use notifications::{GroupedNotifications, NotificationItem};
pub use post::PostView;
pub use reaction::{ReactionChange, ReactionCounts, ReactionKind};
