use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReactionKind {
    Love,
    Laugh,
    Crying,
    Hug,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown reaction: {0}")]
pub struct UnknownReaction(pub String);

impl ReactionKind {
    pub const ALL: [ReactionKind; 4] = [
        ReactionKind::Love,
        ReactionKind::Laugh,
        ReactionKind::Crying,
        ReactionKind::Hug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Love => "Love",
            ReactionKind::Laugh => "Laugh",
            ReactionKind::Crying => "Crying",
            ReactionKind::Hug => "Hug",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ReactionKind::Love => "❤️",
            ReactionKind::Laugh => "😂",
            ReactionKind::Crying => "😭",
            ReactionKind::Hug => "🫂",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = UnknownReaction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownReaction(s.to_string()))
    }
}

/// Per-kind tally for one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    #[serde(rename = "Love")]
    pub love: u32,
    #[serde(rename = "Laugh")]
    pub laugh: u32,
    #[serde(rename = "Crying")]
    pub crying: u32,
    #[serde(rename = "Hug")]
    pub hug: u32,
}

impl ReactionCounts {
    pub fn tally<I>(values: I) -> Self
    where
        I: IntoIterator<Item = ReactionKind>,
    {
        let mut counts = Self::default();
        for kind in values {
            counts.add(kind);
        }
        counts
    }

    pub fn add(&mut self, kind: ReactionKind) {
        *self.slot(kind) += 1;
    }

    pub fn total(&self) -> u32 {
        self.love + self.laugh + self.crying + self.hug
    }

    fn slot(&mut self, kind: ReactionKind) -> &mut u32 {
        match kind {
            ReactionKind::Love => &mut self.love,
            ReactionKind::Laugh => &mut self.laugh,
            ReactionKind::Crying => &mut self.crying,
            ReactionKind::Hug => &mut self.hug,
        }
    }
}

/// What pressing a reaction button does to the viewer's reaction on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChange {
    /// Same reaction pressed again: take it back.
    Removed,
    /// New or different reaction: upsert.
    Set(ReactionKind),
}

pub fn toggle(existing: Option<ReactionKind>, requested: ReactionKind) -> ReactionChange {
    match existing {
        Some(current) if current == requested => ReactionChange::Removed,
        _ => ReactionChange::Set(requested),
    }
}
