//! AI difficulty presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Skill level for computer-controlled tanks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

impl AiDifficulty {
    pub fn profile(self) -> DifficultyProfile {
        match self {
            Self::Easy => DifficultyProfile {
                accuracy: 0.55,
                reaction_time: 1.2,
                aim_speed: 0.8,
                fire_delay: 0.8,
                randomness: 0.35,
                engage_range: 35.0,
            },
            Self::Normal => DifficultyProfile {
                accuracy: 0.75,
                reaction_time: 0.7,
                aim_speed: 1.4,
                fire_delay: 0.45,
                randomness: 0.2,
                engage_range: 45.0,
            },
            Self::Hard => DifficultyProfile {
                accuracy: 0.92,
                reaction_time: 0.35,
                aim_speed: 2.2,
                fire_delay: 0.2,
                randomness: 0.08,
                engage_range: 55.0,
            },
        }
    }
}

impl fmt::Display for AiDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Easy => "easy",
            Self::Normal => "normal",
            Self::Hard => "hard",
        };
        f.write_str(name)
    }
}

impl FromStr for AiDifficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" | "medium" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown AI difficulty: {0}")]
pub struct UnknownDifficulty(pub String);

/// Tunables that vary with difficulty; everything else is shared
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifficultyProfile {
    /// 0..1, scales down aim jitter
    pub accuracy: f32,
    /// Seconds between acquiring a target and engaging it
    pub reaction_time: f32,
    /// Radians per second the aim solution is tracked at
    pub aim_speed: f32,
    /// Seconds the aim must stay on target before firing
    pub fire_delay: f32,
    /// 0..1, steering noise while driving
    pub randomness: f32,
    pub engage_range: f32,
}
