use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

use super::calendar::local_date;
use super::reaction::ReactionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationItem {
    pub id: String,
    pub kind: String,
    pub actor_id: String,
    pub actor_username: Option<String>,
    pub actor_avatar_url: Option<String>,
    pub post_id: Option<String>,
    pub reaction_value: Option<ReactionKind>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notifications bucketed the way the inbox shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupedNotifications {
    pub new: Vec<NotificationItem>,
    pub today: Vec<NotificationItem>,
    pub yesterday: Vec<NotificationItem>,
    pub older: Vec<NotificationItem>,
}

impl GroupedNotifications {
    /// Unread items always land in `new`; read ones are bucketed by local day.
    pub fn group(items: Vec<NotificationItem>, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let today = local_date(now, offset);
        let yesterday = today - Duration::days(1);

        let mut groups = Self::default();
        for item in items {
            let day = local_date(item.created_at, offset);
            if !item.is_read {
                groups.new.push(item);
            } else if day == today {
                groups.today.push(item);
            } else if day == yesterday {
                groups.yesterday.push(item);
            } else {
                groups.older.push(item);
            }
        }
        groups
    }
}
