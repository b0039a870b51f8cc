//! Application state shared across routes

use std::sync::Arc;

use crate::config::{Config, GameConfig};
use crate::room::RoomRegistry;
use crate::store::SessionRecorder;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Game constants, fixed for the process lifetime
    pub game: Arc<GameConfig>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(config: Config, recorder: Option<SessionRecorder>) -> Self {
        let game = Arc::new(config.game.clone());
        let rooms = Arc::new(RoomRegistry::new(game.clone(), recorder));

        Self {
            config: Arc::new(config),
            game,
            rooms,
        }
    }
}
