use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

use super::mood::Mood;

/// How far back a streak is followed.
const STREAK_LOOKBACK_DAYS: i64 = 365;

/// Calendar date of `ts` in the service's local time.
pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// Local midnight of `day`, expressed in UTC.
pub fn local_midnight_utc(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(midnight - Duration::seconds(offset.local_minus_utc() as i64)))
}

/// Start of the local day containing `now`, expressed in UTC.
pub fn day_start_utc(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    local_midnight_utc(local_date(now, offset), offset)
}

/// A post reduced to what the mood history needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedMood {
    pub created_at: DateTime<Utc>,
    pub mood: Mood,
}

/// Consecutive posting days ending today. A missing post today does not
/// break the streak since the day is not over; any earlier gap does.
pub fn posting_streak(post_days: &HashSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    for i in 0..STREAK_LOOKBACK_DAYS {
        let day = today - Duration::days(i);
        if post_days.contains(&day) {
            streak += 1;
        } else if i == 0 {
            continue;
        } else {
            break;
        }
    }
    streak
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub day_of_month: u32,
    pub day_short: String,
    pub mood: Option<Mood>,
    pub is_future: bool,
}

/// Monday-to-Sunday week containing today. `posts` must be newest first so
/// a day with several posts shows the latest one.
pub fn week_calendar(posts: &[DatedMood], now: DateTime<Utc>, offset: FixedOffset) -> Vec<CalendarDay> {
    let today = local_date(now, offset);
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);

    (0..7)
        .map(|i| {
            let date = monday + Duration::days(i);
            let mood = posts
                .iter()
                .find(|p| local_date(p.created_at, offset) == date)
                .map(|p| p.mood);
            CalendarDay {
                date,
                day_of_month: date.day(),
                day_short: date.format("%a").to_string(),
                mood,
                is_future: date > today,
            }
        })
        .collect()
}

/// Most frequent mood. Ties go to the mood seen first in newest-first order.
pub fn dominant_mood(posts: &[DatedMood]) -> Option<Mood> {
    let mut counts: Vec<(Mood, u32)> = Vec::new();
    for post in posts {
        match counts.iter_mut().find(|(mood, _)| *mood == post.mood) {
            Some((_, count)) => *count += 1,
            None => counts.push((post.mood, 1)),
        }
    }

    let mut best: Option<(Mood, u32)> = None;
    for (mood, count) in counts {
        if best.map_or(true, |(_, max)| count > max) {
            best = Some((mood, count));
        }
    }
    best.map(|(mood, _)| mood)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub dominant: Option<Mood>,
    pub total: usize,
    pub streak: u32,
    pub calendar: Vec<CalendarDay>,
    pub advice: Option<String>,
}

impl ProfileStats {
    /// `posts` newest first.
    pub fn compute(posts: &[DatedMood], now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let post_days: HashSet<NaiveDate> = posts
            .iter()
            .map(|p| local_date(p.created_at, offset))
            .collect();

        Self {
            dominant: dominant_mood(posts),
            total: posts.len(),
            streak: posting_streak(&post_days, local_date(now, offset)),
            calendar: week_calendar(posts, now, offset),
            advice: None,
        }
    }

    /// Adds a line of advice for the dominant mood, if there is one.
    pub fn with_advice<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.advice = self
            .dominant
            .map(|mood| mood.pick_advice(rng).to_string());
        self
    }
}
