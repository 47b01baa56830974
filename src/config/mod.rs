//! Configuration module - environment variable parsing

mod names;

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub use names::TANK_NAMES;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Connection, pacing and admission settings
    pub server: ServerConfig,
    /// Arena tuning
    pub game: GameConfig,
}

/// Server-side pacing and admission settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Target frame rate of the tick loop
    pub frames_per_second: u32,
    /// How many state updates are sent to clients each second
    pub updates_per_second: u32,
    /// Seconds between FPS log lines
    pub fps_log_secs: u64,
    /// A round only starts once this many players are connected
    pub min_players: usize,
    /// Player connections beyond this count are refused
    pub max_players: usize,
    /// Silence after which a keepalive probe is sent
    pub client_timeout: Duration,
    /// Longest accepted SetInfo string (in characters)
    pub info_max_len: usize,
    /// Pending commands per player before the reader is back-pressured
    pub command_queue_capacity: usize,
    /// Inbound messages per second allowed on one connection
    pub commands_per_second: u32,
    /// WebSocket path for player clients
    pub player_path: String,
    /// WebSocket path for observer clients
    pub observer_path: String,
    /// Display names; a player's session id indexes into this table
    pub tank_names: Vec<String>,
}

/// Arena geometry, speeds and placement rules
///
/// (0, 0) is the upper left corner of the map with +x to the right and +y down.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub map_width: f32,
    pub map_height: f32,

    pub tank_speed: f32,
    pub tank_width: f32,
    pub tank_height: f32,
    /// Minimum seconds between two shots of the same tank
    pub tank_reload_secs: f64,
    /// Slack subtracted from the reload time to absorb network jitter
    pub reload_margin_secs: f64,
    /// Minimum gap between freshly spawned tanks
    pub spawn_padding: f32,

    pub shell_speed: f32,
    pub shell_width: f32,
    pub shell_height: f32,

    pub wall_short_side: (f32, f32),
    pub wall_long_side: (f32, f32),
    /// Minimum gap between walls, including the edge of the map
    pub wall_placement_padding: f32,
    pub wall_count: (u32, u32),

    /// Rejection-sampling budget for each wall and each spawn point
    pub placement_attempts: u32,
    /// Fixed RNG seed for round setup (random when unset)
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 60,
            updates_per_second: 10,
            fps_log_secs: 5,
            min_players: 4,
            max_players: 15,
            client_timeout: Duration::from_secs(5),
            info_max_len: 200,
            command_queue_capacity: 16,
            commands_per_second: 30,
            player_path: "/arena/v1/player".to_string(),
            observer_path: "/arena/observer".to_string(),
            tank_names: TANK_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map_width: 500.0,
            map_height: 500.0,
            tank_speed: 30.0,
            tank_width: 10.0,
            tank_height: 10.0,
            tank_reload_secs: 1.5,
            reload_margin_secs: 0.2,
            spawn_padding: 10.0,
            shell_speed: 150.0,
            shell_width: 1.0,
            shell_height: 1.0,
            wall_short_side: (15.0, 30.0),
            wall_long_side: (50.0, 200.0),
            wall_placement_padding: 15.0,
            wall_count: (3, 7),
            placement_attempts: 1_000,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so hosted deployments work unchanged
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:9042".to_string())
        };

        let server_defaults = ServerConfig::default();
        let timeout_secs: f64 = env_or(
            "CLIENT_TIMEOUT_SECS",
            server_defaults.client_timeout.as_secs_f64(),
        )?;
        if !(timeout_secs.is_finite() && timeout_secs > 0.0) {
            return Err(ConfigError::Invalid("CLIENT_TIMEOUT_SECS must be positive"));
        }
        let server = ServerConfig {
            frames_per_second: env_or("FRAMES_PER_SECOND", server_defaults.frames_per_second)?,
            updates_per_second: env_or("UPDATES_PER_SECOND", server_defaults.updates_per_second)?,
            fps_log_secs: env_or("FPS_LOG_SECS", server_defaults.fps_log_secs)?,
            min_players: env_or("MIN_PLAYERS", server_defaults.min_players)?,
            max_players: env_or("MAX_PLAYERS", server_defaults.max_players)?,
            client_timeout: Duration::from_secs_f64(timeout_secs),
            info_max_len: env_or("INFO_MAX_LEN", server_defaults.info_max_len)?,
            command_queue_capacity: env_or(
                "COMMAND_QUEUE_CAPACITY",
                server_defaults.command_queue_capacity,
            )?,
            commands_per_second: env_or("COMMANDS_PER_SECOND", server_defaults.commands_per_second)?,
            player_path: env::var("PLAYER_PATH").unwrap_or(server_defaults.player_path),
            observer_path: env::var("OBSERVER_PATH").unwrap_or(server_defaults.observer_path),
            tank_names: server_defaults.tank_names,
        };

        let game_defaults = GameConfig::default();
        let tank_size: f32 = env_or("TANK_SIZE", game_defaults.tank_width)?;
        let game = GameConfig {
            map_width: env_or("MAP_WIDTH", game_defaults.map_width)?,
            map_height: env_or("MAP_HEIGHT", game_defaults.map_height)?,
            tank_speed: env_or("TANK_SPEED", game_defaults.tank_speed)?,
            tank_width: tank_size,
            tank_height: tank_size,
            tank_reload_secs: env_or("TANK_RELOAD_SECS", game_defaults.tank_reload_secs)?,
            shell_speed: env_or("SHELL_SPEED", game_defaults.shell_speed)?,
            placement_attempts: env_or("PLACEMENT_ATTEMPTS", game_defaults.placement_attempts)?,
            seed: env::var("ARENA_SEED")
                .ok()
                .map(|raw| raw.parse().map_err(|_| ConfigError::Malformed("ARENA_SEED")))
                .transpose()?,
            ..game_defaults
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            server,
            game,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        let game = &self.game;

        if server.frames_per_second == 0 || server.updates_per_second == 0 {
            return Err(ConfigError::Invalid("frame and update rates must be positive"));
        }
        // A round with one tank ends on its first tick
        if server.min_players < 2 || server.min_players > server.max_players {
            return Err(ConfigError::Invalid("MIN_PLAYERS must be between 2 and MAX_PLAYERS"));
        }
        if server.max_players > server.tank_names.len() {
            return Err(ConfigError::Invalid("MAX_PLAYERS exceeds the number of tank names"));
        }
        if server.command_queue_capacity == 0 || server.commands_per_second == 0 {
            return Err(ConfigError::Invalid("command queue and rate limits must be positive"));
        }
        if server.player_path == server.observer_path {
            return Err(ConfigError::Invalid("player and observer paths must differ"));
        }
        if game.tank_width <= 0.0 || game.tank_height <= 0.0 {
            return Err(ConfigError::Invalid("tank size must be positive"));
        }
        if game.map_width < game.tank_width * 2.0 || game.map_height < game.tank_height * 2.0 {
            return Err(ConfigError::Invalid("map is too small for a tank"));
        }
        let padded_width = game.map_width - 2.0 * game.wall_placement_padding;
        let padded_height = game.map_height - 2.0 * game.wall_placement_padding;
        if game.wall_long_side.0 > padded_width.min(padded_height) {
            return Err(ConfigError::Invalid("walls do not fit inside the padded map"));
        }
        if game.wall_short_side.0 > game.wall_short_side.1
            || game.wall_long_side.0 > game.wall_long_side.1
            || game.wall_count.0 > game.wall_count.1
        {
            return Err(ConfigError::Invalid("wall bounds must be ordered (min, max)"));
        }
        if game.placement_attempts == 0 {
            return Err(ConfigError::Invalid("PLACEMENT_ATTEMPTS must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Config {
    /// Defaults without touching the process environment
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().expect("static address"),
            log_level: "debug".to_string(),
            server: ServerConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Read `key` and parse it, or fall back to `default` when unset
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Malformed(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Malformed value for environment variable: {0}")]
    Malformed(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::for_tests().validate().is_ok());
    }

    #[test]
    fn test_max_players_bounded_by_names() {
        let mut config = Config::for_tests();
        config.server.max_players = config.server.tank_names.len() + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_min_players_above_max_rejected() {
        let mut config = Config::for_tests();
        config.server.min_players = config.server.max_players + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_player_rounds_rejected() {
        let mut config = Config::for_tests();
        config.server.min_players = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.server.min_players = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_same_paths_rejected() {
        let mut config = Config::for_tests();
        config.server.observer_path = config.server.player_path.clone();
        assert!(config.validate().is_err());
    }
}
