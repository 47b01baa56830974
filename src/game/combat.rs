//! Combat system - firing and shell hit detection

use crate::config::GameConfig;
use crate::session::SessionId;

use super::collision::overlaps;
use super::entity::{Shell, Tank};

/// Why a Fire command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FireRejected {
    #[error("Cannon is still reloading")]
    Reloading,

    #[error("Dead tanks can't fire")]
    Dead,
}

/// Combat system for firing and hit detection
pub struct CombatSystem;

impl CombatSystem {
    /// Fire a shell from `tank` if it is alive and reloaded
    ///
    /// On rejection the tank is left untouched.
    pub fn fire(
        shooter_id: SessionId,
        tank: &mut Tank,
        heading: f32,
        now: f64,
        config: &GameConfig,
    ) -> Result<Shell, FireRejected> {
        if !tank.alive {
            return Err(FireRejected::Dead);
        }
        if !tank.can_shoot(now, config) {
            return Err(FireRejected::Reloading);
        }

        tank.last_shot = Some(now);
        Ok(Shell::new(shooter_id, tank, heading))
    }

    /// Index of the first shell that hits `tank`, ignoring its own shells
    pub fn find_hit(
        tank_id: SessionId,
        tank: &Tank,
        shells: &[Shell],
        tank_shell_bound: f32,
        config: &GameConfig,
    ) -> Option<usize> {
        let poly = tank.polygon(config);
        shells.iter().position(|shell| {
            shell.shooter_id != tank_id
                && overlaps(&poly, &shell.polygon(config), Some(tank_shell_bound))
        })
    }
}
