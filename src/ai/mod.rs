//! Computer-controlled combatants

pub mod controller;
pub mod difficulty;

pub use controller::{AiController, AiState};
pub use difficulty::{AiDifficulty, DifficultyProfile};
