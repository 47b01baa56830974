//! Movement, map bounds and tank collision resolution

use crate::config::GameConfig;

use super::collision::{max_dist, overlaps, Point};
use super::entity::{Shell, Tank, Wall};

/// Precomputed `max_dist` bounds per pair of shape classes
#[derive(Debug, Clone, Copy)]
pub struct CollisionBounds {
    pub tank_tank: f32,
    pub tank_shell: f32,
}

impl CollisionBounds {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            tank_tank: max_dist(
                config.tank_width,
                config.tank_height,
                config.tank_width,
                config.tank_height,
            ),
            tank_shell: max_dist(
                config.tank_width,
                config.tank_height,
                config.shell_width,
                config.shell_height,
            ),
        }
    }
}

/// Physics system for moving tanks and shells
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Position after travelling `distance` along `heading`
    ///
    /// +y points down the screen, so a positive heading component moves up.
    pub fn advance(x: f32, y: f32, heading: f32, distance: f32) -> (f32, f32) {
        (x + heading.cos() * distance, y - heading.sin() * distance)
    }

    /// Is the point outside the map rectangle
    pub fn point_outside_map(x: f32, y: f32, config: &GameConfig) -> bool {
        x < 0.0 || y < 0.0 || x > config.map_width || y > config.map_height
    }

    /// Does any corner of the polygon leave the map
    pub fn outside_map(poly: &[Point], config: &GameConfig) -> bool {
        poly.iter()
            .any(|p| Self::point_outside_map(p.x, p.y, config))
    }

    /// Move every shell and drop the ones that left the map or hit a wall
    pub fn step_shells(shells: &mut Vec<Shell>, walls: &[Wall], dt: f32, config: &GameConfig) {
        let distance = config.shell_speed * dt;
        shells.retain_mut(|shell| {
            shell.advance(distance);
            if Self::point_outside_map(shell.x, shell.y, config) {
                return false;
            }
            let poly = shell.polygon(config);
            !walls.iter().any(|wall| overlaps(&poly, &wall.polygon(0.0), None))
        });
    }

    /// Drive a moving tank forward and undo the move if it ends up blocked
    ///
    /// `obstacles` holds the footprints of the tanks this one may collide with:
    /// stationary tanks plus the ones that already moved this tick. Returns
    /// false when the move was rolled back.
    pub fn move_tank(
        tank: &mut Tank,
        dt: f32,
        obstacles: &[[Point; 4]],
        walls: &[Wall],
        bounds: &CollisionBounds,
        config: &GameConfig,
    ) -> bool {
        let distance = config.tank_speed * dt;
        tank.advance(distance);

        let poly = tank.polygon(config);
        let blocked = Self::outside_map(&poly, config)
            || obstacles
                .iter()
                .any(|other| overlaps(&poly, other, Some(bounds.tank_tank)))
            || walls
                .iter()
                .any(|wall| overlaps(&poly, &wall.polygon(0.0), None));

        if blocked {
            tank.advance(-distance);
            tank.moving = false;
        }
        !blocked
    }
}
