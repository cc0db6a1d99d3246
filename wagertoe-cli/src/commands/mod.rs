pub mod game;
pub mod live;
pub mod settings;

pub use game::{handle_game_command, GameCommands};
pub use live::{play, watch};
pub use settings::{handle_config_command, ConfigCommands};
