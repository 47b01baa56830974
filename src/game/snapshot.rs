//! Snapshot building and fan-out

use tracing::error;

use crate::session::SessionId;
use crate::ws::protocol::{
    CleanTank, FullTank, ObserverSnapshot, OwnTank, PlayerSnapshot, ServerMsg, ShellView,
    WallView, SNAPSHOT_VERSION,
};

use super::world::{ClientKind, Player, World};

/// Decides when to publish and queues one snapshot per client
pub struct Broadcaster {
    /// Seconds between snapshots
    interval: f32,
    since_last: f32,
}

impl Broadcaster {
    pub fn new(updates_per_second: u32) -> Self {
        let interval = 1.0 / updates_per_second.max(1) as f32;
        Self {
            interval,
            // First frame publishes right away
            since_last: interval,
        }
    }

    /// Advance the timer by one frame; true when a snapshot is due
    pub fn due(&mut self, dt: f32) -> bool {
        self.since_last += dt;
        if self.since_last >= self.interval {
            self.since_last = 0.0;
            true
        } else {
            false
        }
    }

    /// Queue the current state for every client
    ///
    /// Players get their own tank in full and everyone else cleaned; all
    /// observers share one full view.
    pub fn publish(&self, world: &World) {
        let shells: Vec<ShellView> = world
            .shells()
            .iter()
            .map(|s| ShellView {
                x: s.x,
                y: s.y,
                heading: s.heading,
                shooter_id: s.shooter_id,
            })
            .collect();
        let walls: Vec<WallView> = world
            .walls()
            .iter()
            .map(|w| WallView {
                x: w.x,
                y: w.y,
                width: w.width,
                height: w.height,
            })
            .collect();
        let ongoing_game = world.is_ongoing();

        let mut observer_json: Option<String> = None;

        for (id, client) in world.clients() {
            let json = match &client.kind {
                ClientKind::Player(player) => {
                    let snapshot = PlayerSnapshot {
                        version: SNAPSHOT_VERSION,
                        ongoing_game,
                        my_tank: OwnTank {
                            tank: full_tank(player),
                            can_shoot: player.tank.alive
                                && player.tank.can_shoot(world.now(), world.config()),
                        },
                        tanks: world
                            .clients()
                            .filter(|(other, _)| *other != id)
                            .filter_map(|(other, c)| c.player().map(|p| clean_tank(other, p)))
                            .collect(),
                        shells: &shells,
                        walls: &walls,
                    };
                    serde_json::to_string(&snapshot)
                }
                ClientKind::Observer => match &observer_json {
                    Some(json) => Ok(json.clone()),
                    None => {
                        let snapshot = ObserverSnapshot {
                            version: SNAPSHOT_VERSION,
                            ongoing_game,
                            tanks: world
                                .clients()
                                .filter_map(|(_, c)| c.player().map(full_tank))
                                .collect(),
                            shells: &shells,
                            walls: &walls,
                        };
                        serde_json::to_string(&snapshot).map(|json| {
                            observer_json = Some(json.clone());
                            json
                        })
                    }
                },
            };

            match json {
                Ok(json) => client.mailbox.enqueue_outgoing(ServerMsg::Snapshot(json)),
                Err(e) => error!(session_id = id, error = %e, "Failed to serialize snapshot"),
            }
        }
    }
}

fn full_tank(player: &Player) -> FullTank<'_> {
    let tank = &player.tank;
    FullTank {
        name: &player.name,
        x: tank.x,
        y: tank.y,
        heading: tank.heading,
        moving: tank.moving,
        alive: tank.alive,
        kills: tank.kills,
        wins: tank.wins,
        info: &tank.info,
    }
}

fn clean_tank(id: SessionId, player: &Player) -> CleanTank {
    let tank = &player.tank;
    CleanTank {
        id,
        x: tank.x,
        y: tank.y,
        heading: tank.heading,
        moving: tank.moving,
        alive: tank.alive,
    }
}
