//! Tanks, shells and walls

use rand::Rng;

use crate::config::GameConfig;
use crate::session::SessionId;

use super::collision::{rectangle, Point};
use super::physics::PhysicsSystem;

/// Where a tank waits until its first round starts
const PARKED_POSITION: (f32, f32) = (-100.0, -100.0);

/// Authoritative state of one player's tank
#[derive(Debug, Clone, PartialEq)]
pub struct Tank {
    pub x: f32,
    pub y: f32,
    /// Radians from the +x axis, counter-clockwise on screen
    pub heading: f32,
    pub moving: bool,
    pub alive: bool,

    /// Kills in the current round
    pub kills: u32,
    /// Rounds won
    pub wins: u32,

    /// Simulation time of the last shot
    pub last_shot: Option<f64>,
    /// Sanitized free text set by the player
    pub info: String,
}

impl Tank {
    /// A dead, parked tank for a player who joined outside of a round
    pub fn new() -> Self {
        Self {
            x: PARKED_POSITION.0,
            y: PARKED_POSITION.1,
            heading: 0.0,
            moving: false,
            alive: false,
            kills: 0,
            wins: 0,
            last_shot: None,
            info: String::new(),
        }
    }

    /// Bring the tank back to life at a new position for the next round
    pub fn respawn(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.heading = 0.0;
        self.moving = false;
        self.alive = true;
        self.kills = 0;
        self.last_shot = None;
    }

    /// Move `distance` units along the current heading (negative moves back)
    pub fn advance(&mut self, distance: f32) {
        (self.x, self.y) = PhysicsSystem::advance(self.x, self.y, self.heading, distance);
    }

    pub fn polygon(&self, config: &GameConfig) -> [Point; 4] {
        rectangle(self.x, self.y, config.tank_width, config.tank_height, 0.0)
    }

    /// Footprint grown by `margin` on every side
    pub fn padded_polygon(&self, config: &GameConfig, margin: f32) -> [Point; 4] {
        rectangle(self.x, self.y, config.tank_width, config.tank_height, margin)
    }

    /// Has the cannon reloaded at simulation time `now`
    pub fn can_shoot(&self, now: f64, config: &GameConfig) -> bool {
        match self.last_shot {
            Some(last) => now - last >= config.tank_reload_secs - config.reload_margin_secs,
            None => true,
        }
    }
}

impl Default for Tank {
    fn default() -> Self {
        Self::new()
    }
}

/// A shell in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub shooter_id: SessionId,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

impl Shell {
    /// Fire a shell from the center of `tank`
    pub fn new(shooter_id: SessionId, tank: &Tank, heading: f32) -> Self {
        Self {
            shooter_id,
            x: tank.x,
            y: tank.y,
            heading,
        }
    }

    pub fn advance(&mut self, distance: f32) {
        (self.x, self.y) = PhysicsSystem::advance(self.x, self.y, self.heading, distance);
    }

    pub fn polygon(&self, config: &GameConfig) -> [Point; 4] {
        rectangle(self.x, self.y, config.shell_width, config.shell_height, 0.0)
    }
}

/// An immovable block of cover
#[derive(Debug, Clone, PartialEq)]
pub struct Wall {
    /// Center x
    pub x: f32,
    /// Center y
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Wall {
    /// Roll a random wall inside the padded map
    ///
    /// One wall in three lies horizontally. The wall is clipped so it never
    /// reaches into the padding along the map edge.
    pub fn generate<R: Rng>(rng: &mut R, config: &GameConfig) -> Self {
        let padding = config.wall_placement_padding;
        let long_side = rng.gen_range(config.wall_long_side.0..=config.wall_long_side.1);
        let short_side = rng.gen_range(config.wall_short_side.0..=config.wall_short_side.1);

        let horizontal = rng.gen_range(0..3) == 0;
        let (mut width, mut height) = if horizontal {
            (long_side, short_side)
        } else {
            (short_side, long_side)
        };
        let (min_width, min_height) = if horizontal {
            (config.wall_long_side.0, config.wall_short_side.0)
        } else {
            (config.wall_short_side.0, config.wall_long_side.0)
        };

        // Top-left corner
        let left = rng.gen_range(padding..=config.map_width - padding - min_width);
        let top = rng.gen_range(padding..=config.map_height - padding - min_height);

        width = width.min(config.map_width - padding - left);
        height = height.min(config.map_height - padding - top);

        Self {
            x: left + width / 2.0,
            y: top + height / 2.0,
            width,
            height,
        }
    }

    /// Footprint grown by `margin` on every side
    pub fn polygon(&self, margin: f32) -> [Point; 4] {
        rectangle(self.x, self.y, self.width, self.height, margin)
    }
}
