use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Emotional tag attached to every post. Only drives display styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Happy,
    Sad,
    InLove,
    Angry,
    Gloomy,
    Boring,
    FlatFace,
}

/// Styling data a client needs to render a mood badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoodPalette {
    pub color: &'static str,
    pub glow: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mood: {0}")]
pub struct UnknownMood(pub String);

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Happy,
        Mood::Sad,
        Mood::InLove,
        Mood::Angry,
        Mood::Gloomy,
        Mood::Boring,
        Mood::FlatFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::InLove => "InLove",
            Mood::Angry => "Angry",
            Mood::Gloomy => "Gloomy",
            Mood::Boring => "Boring",
            Mood::FlatFace => "FlatFace",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Mood::Happy => "😊",
            Mood::Sad => "😢",
            Mood::InLove => "😍",
            Mood::Angry => "😡",
            Mood::Gloomy => "☁️",
            Mood::Boring => "😐",
            Mood::FlatFace => "😶",
        }
    }

    pub fn palette(&self) -> MoodPalette {
        let (color, glow) = match self {
            Mood::Happy => ("yellow", "rgba(234,179,8,0.3)"),
            Mood::Sad => ("blue", "rgba(59,130,246,0.3)"),
            Mood::InLove => ("pink", "rgba(236,72,153,0.3)"),
            Mood::Angry => ("red", "rgba(239,68,68,0.3)"),
            Mood::Gloomy => ("gray", "rgba(156,163,175,0.2)"),
            Mood::Boring => ("orange", "rgba(249,115,22,0.3)"),
            Mood::FlatFace => ("slate", "rgba(100,116,139,0.2)"),
        };
        MoodPalette { color, glow }
    }

    pub fn advice_pool(&self) -> &'static [&'static str] {
        match self {
            Mood::Happy => &[
                "Keep shining! Your energy is contagious today.",
                "Mission: Share this joy with a stranger.",
                "Happiness looks gorgeous on you.",
                "Save this feeling. Bottle it up for a rainy day.",
                "You are the sun in someone else's sky today.",
            ],
            Mood::Sad => &[
                "It's okay not to be okay. Take a deep breath.",
                "Mission: Listen to your favorite slow song.",
                "Tears are just words the heart can't say.",
                "Be gentle with yourself. You're healing.",
                "This too shall pass. Just breathe.",
            ],
            Mood::InLove => &[
                "Love is in the air! Enjoy this beautiful feeling.",
                "Mission: Send a text to someone you appreciate.",
                "The world looks brighter through your eyes today.",
                "Hold onto this warmth. It's rare.",
                "Heart full, vibes high. Enjoy the flutter.",
            ],
            Mood::Angry => &[
                "Channel that fire into something creative.",
                "Mission: Put your phone down and take a walk.",
                "Don't let the noise disturb your inner peace.",
                "Anger is an energy. Use it wisely, don't burn out.",
                "Deep breath in. Deep breath out. Let it go.",
            ],
            Mood::Gloomy => &[
                "Even the darkest clouds have a silver lining.",
                "Mission: Go outside and look at the sky.",
                "It's a slow day, and that is perfectly fine.",
                "Rest if you must, but don't you quit.",
                "Stars only shine when it's dark enough.",
            ],
            Mood::Boring => &[
                "Maybe it's time to try something new?",
                "Mission: Read a book or watch a documentary.",
                "Boredom is the birthplace of creativity.",
                "Do one thing that scares you today.",
                "Routine is safe, but adventure is waiting.",
            ],
            Mood::FlatFace => &[
                "Just flowing with the day. Stay chill.",
                "Mission: Drink a glass of water. Hydrate.",
                "Neutral is a powerful place to be.",
                "No drama, no stress. Just being.",
                "Peace is the new luxury.",
            ],
        }
    }

    pub fn pick_advice<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        self.advice_pool().choose(rng).copied().unwrap_or_default()
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == s)
            .ok_or_else(|| UnknownMood(s.to_string()))
    }
}
