//! Authoritative arena state and round lifecycle
//!
//! The [`World`] is owned by the tick loop and never shared; connection tasks
//! only reach it through their session mailboxes.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::session::{Mailbox, RegistryEvent, Seat, SessionId};
use crate::ws::protocol::{Command, ServerMsg};

use super::collision::{overlaps, rectangle, Point};
use super::combat::{CombatSystem, FireRejected};
use super::entity::{Shell, Tank, Wall};
use super::physics::{CollisionBounds, PhysicsSystem};

/// Round phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Not enough players, or between rounds
    WaitingForPlayers,
    /// Round in progress
    InProgress,
}

/// A connected player and their tank
#[derive(Debug)]
pub struct Player {
    pub name: String,
    pub tank: Tank,
}

/// What a session is: players always carry a tank, observers never do
#[derive(Debug)]
pub enum ClientKind {
    Player(Player),
    Observer,
}

/// One seated session
#[derive(Debug)]
pub struct Client {
    pub kind: ClientKind,
    pub mailbox: Mailbox,
}

impl Client {
    pub fn player(&self) -> Option<&Player> {
        match &self.kind {
            ClientKind::Player(player) => Some(player),
            ClientKind::Observer => None,
        }
    }

    fn player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.kind {
            ClientKind::Player(player) => Some(player),
            ClientKind::Observer => None,
        }
    }
}

/// Round setup failures
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Could not place a {what} after {attempts} attempts; the map is too crowded for the configured sizes")]
    PlacementExhausted { what: &'static str, attempts: u32 },
}

/// The arena
pub struct World {
    config: GameConfig,
    bounds: CollisionBounds,
    phase: RoundPhase,
    round: u64,
    /// Seconds of simulated time; only advances while a round runs
    now: f64,
    /// Ordered by id so every tick visits sessions in the same order
    clients: BTreeMap<SessionId, Client>,
    shells: Vec<Shell>,
    walls: Vec<Wall>,
    rng: ChaCha8Rng,
}

impl World {
    pub fn new(config: GameConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            bounds: CollisionBounds::from_config(&config),
            config,
            phase: RoundPhase::WaitingForPlayers,
            round: 0,
            now: 0.0,
            clients: BTreeMap::new(),
            shells: Vec::new(),
            walls: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_ongoing(&self) -> bool {
        self.phase == RoundPhase::InProgress
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn clients(&self) -> impl Iterator<Item = (SessionId, &Client)> {
        self.clients.iter().map(|(id, client)| (*id, client))
    }

    pub fn shells(&self) -> &[Shell] {
        &self.shells
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Connected players, alive or not
    pub fn player_count(&self) -> usize {
        self.players().count()
    }

    /// Players whose tank is still in the round
    pub fn alive_count(&self) -> usize {
        self.players().filter(|(_, p)| p.tank.alive).count()
    }

    pub fn tank(&self, id: SessionId) -> Option<&Tank> {
        self.clients
            .get(&id)
            .and_then(Client::player)
            .map(|p| &p.tank)
    }

    fn players(&self) -> impl Iterator<Item = (SessionId, &Player)> {
        self.clients
            .iter()
            .filter_map(|(id, client)| client.player().map(|p| (*id, p)))
    }

    fn tank_mut(&mut self, id: SessionId) -> Option<&mut Tank> {
        self.clients
            .get_mut(&id)
            .and_then(Client::player_mut)
            .map(|p| &mut p.tank)
    }

    /// Seat or remove a session
    pub fn apply_event(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::Joined { id, seat, mailbox } => self.add_client(id, seat, mailbox),
            RegistryEvent::Left { id } => self.remove_client(id),
        }
    }

    /// Seat a new session; a late player waits dead until the next round
    pub fn add_client(&mut self, id: SessionId, seat: Seat, mailbox: Mailbox) {
        let kind = match seat {
            Seat::Player { name } => ClientKind::Player(Player {
                name,
                tank: Tank::new(),
            }),
            Seat::Observer => ClientKind::Observer,
        };
        self.clients.insert(id, Client { kind, mailbox });
        info!(session_id = id, players = self.player_count(), "Client joined the arena");
    }

    /// Drop a session and its tank
    pub fn remove_client(&mut self, id: SessionId) {
        if self.clients.remove(&id).is_some() {
            info!(session_id = id, players = self.player_count(), "Client left the arena");
        }
    }

    /// Lay out fresh walls, respawn every player and start the round
    pub fn start_round(&mut self) -> Result<(), WorldError> {
        self.shells.clear();
        self.walls.clear();

        let (min_walls, max_walls) = self.config.wall_count;
        let wall_count = self.rng.gen_range(min_walls..=max_walls);
        for _ in 0..wall_count {
            let wall = self.place_wall()?;
            self.walls.push(wall);
        }

        let player_ids: Vec<SessionId> = self.players().map(|(id, _)| id).collect();
        let mut spawned: Vec<[Point; 4]> = Vec::with_capacity(player_ids.len());
        for id in player_ids {
            let (x, y) = self.find_spawn(&spawned)?;
            if let Some(player) = self.clients.get_mut(&id).and_then(Client::player_mut) {
                player.tank.respawn(x, y);
                spawned.push(
                    player
                        .tank
                        .padded_polygon(&self.config, self.config.spawn_padding),
                );
            }
        }

        self.phase = RoundPhase::InProgress;
        self.round += 1;
        info!(
            round = self.round,
            players = spawned.len(),
            walls = self.walls.len(),
            "New round started"
        );
        Ok(())
    }

    /// Roll walls until one keeps its padding from every wall placed so far
    fn place_wall(&mut self) -> Result<Wall, WorldError> {
        let padding = self.config.wall_placement_padding;
        for _ in 0..self.config.placement_attempts {
            let wall = Wall::generate(&mut self.rng, &self.config);
            let poly = wall.polygon(0.0);
            let blocked = self
                .walls
                .iter()
                .any(|other| overlaps(&poly, &other.polygon(padding), None));
            if !blocked {
                return Ok(wall);
            }
        }
        Err(WorldError::PlacementExhausted {
            what: "wall",
            attempts: self.config.placement_attempts,
        })
    }

    /// Roll spawn points around the map center until one is clear
    fn find_spawn(&mut self, spawned: &[[Point; 4]]) -> Result<(f32, f32), WorldError> {
        let config = &self.config;
        let half_width = config.map_width / 2.0 - config.tank_width;
        let half_height = config.map_height / 2.0 - config.tank_height;

        for _ in 0..config.placement_attempts {
            let x = config.map_width / 2.0 + self.rng.gen_range(-half_width..=half_width);
            let y = config.map_height / 2.0 + self.rng.gen_range(-half_height..=half_height);
            let poly = rectangle(x, y, config.tank_width, config.tank_height, 0.0);

            let blocked = self
                .walls
                .iter()
                .any(|wall| overlaps(&poly, &wall.polygon(0.0), None))
                || spawned.iter().any(|other| overlaps(&poly, other, None));
            if !blocked {
                return Ok((x, y));
            }
        }
        Err(WorldError::PlacementExhausted {
            what: "tank",
            attempts: config.placement_attempts,
        })
    }

    /// Advance the round by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if self.phase != RoundPhase::InProgress {
            return;
        }
        self.now += f64::from(dt);

        PhysicsSystem::step_shells(&mut self.shells, &self.walls, dt, &self.config);
        self.apply_commands();
        self.move_tanks(dt);
        self.resolve_hits();
        self.check_round_end();
    }

    /// Apply at most one gameplay command per player
    ///
    /// SetInfo is applied on the way without using up the player's turn.
    fn apply_commands(&mut self) {
        let now = self.now;
        for (&id, client) in self.clients.iter_mut() {
            let ClientKind::Player(player) = &mut client.kind else {
                continue;
            };
            let tank = &mut player.tank;

            while let Some(command) = client.mailbox.pop_incoming_command() {
                match command {
                    Command::SetInfo(info) => {
                        tank.info = info;
                        continue;
                    }
                    Command::Fire(heading) => {
                        match CombatSystem::fire(id, tank, heading, now, &self.config) {
                            Ok(shell) => self.shells.push(shell),
                            Err(FireRejected::Reloading) => {
                                debug!(session_id = id, "Fire rejected, still reloading");
                                client
                                    .mailbox
                                    .enqueue_outgoing(ServerMsg::Warning(
                                        FireRejected::Reloading.to_string(),
                                    ));
                            }
                            Err(FireRejected::Dead) => {}
                        }
                    }
                    Command::Turn(heading) if tank.alive => tank.heading = heading,
                    Command::Stop if tank.alive => tank.moving = false,
                    Command::Go if tank.alive => tank.moving = true,
                    Command::Turn(_) | Command::Stop | Command::Go => {}
                }
                break;
            }
        }
    }

    /// Move tanks one after another so each only collides with settled tanks
    fn move_tanks(&mut self, dt: f32) {
        let mut settled: Vec<[Point; 4]> = self
            .players()
            .filter(|(_, p)| p.tank.alive && !p.tank.moving)
            .map(|(_, p)| p.tank.polygon(&self.config))
            .collect();

        for client in self.clients.values_mut() {
            let Some(player) = client.player_mut() else {
                continue;
            };
            let tank = &mut player.tank;
            if !tank.alive || !tank.moving {
                continue;
            }

            PhysicsSystem::move_tank(tank, dt, &settled, &self.walls, &self.bounds, &self.config);
            settled.push(tank.polygon(&self.config));
        }
    }

    fn resolve_hits(&mut self) {
        let mut shooters: Vec<SessionId> = Vec::new();

        for (&id, client) in self.clients.iter_mut() {
            let Some(player) = client.player_mut() else {
                continue;
            };
            if !player.tank.alive {
                continue;
            }

            let hit = CombatSystem::find_hit(
                id,
                &player.tank,
                &self.shells,
                self.bounds.tank_shell,
                &self.config,
            );
            if let Some(index) = hit {
                let shell = self.shells.remove(index);
                player.tank.alive = false;
                player.tank.moving = false;
                shooters.push(shell.shooter_id);
                info!(victim = id, shooter = shell.shooter_id, "Tank destroyed");
            }
        }

        // Shooters who already disconnected get no credit
        for shooter in shooters {
            if let Some(tank) = self.tank_mut(shooter) {
                tank.kills += 1;
            }
        }
    }

    fn check_round_end(&mut self) {
        let alive: Vec<SessionId> = self
            .players()
            .filter(|(_, p)| p.tank.alive)
            .map(|(id, _)| id)
            .collect();
        if alive.len() > 1 {
            return;
        }

        if let &[winner] = alive.as_slice() {
            if let Some(tank) = self.tank_mut(winner) {
                tank.wins += 1;
                tank.alive = false;
                tank.moving = false;
            }
            info!(round = self.round, winner, "Round won");
        } else {
            info!(round = self.round, "Round ended without a survivor");
        }
        self.phase = RoundPhase::WaitingForPlayers;
    }

    /// Empty command queues while no round runs so readers never stall
    ///
    /// Info updates still apply; gameplay commands are dropped.
    pub fn discard_idle_commands(&mut self) {
        for (&id, client) in self.clients.iter_mut() {
            let ClientKind::Player(player) = &mut client.kind else {
                continue;
            };
            let mut dropped = 0usize;
            while let Some(command) = client.mailbox.pop_incoming_command() {
                match command {
                    Command::SetInfo(info) => player.tank.info = info,
                    _ => dropped += 1,
                }
            }
            if dropped > 0 {
                debug!(session_id = id, dropped, "Dropped commands sent between rounds");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{session_channel, SessionLink};

    const DT: f32 = 0.1;

    fn test_config() -> GameConfig {
        GameConfig {
            seed: Some(42),
            ..GameConfig::default()
        }
    }

    fn world_with_players(count: u32) -> (World, Vec<SessionLink>) {
        let mut world = World::new(test_config());
        let links = (0..count)
            .map(|id| {
                let (mailbox, link) = session_channel(8);
                world.add_client(id, Seat::Player { name: format!("Tank {}", id) }, mailbox);
                link
            })
            .collect();
        (world, links)
    }

    /// Start a round, then clear the walls and pin tanks where a test wants them
    fn arena(positions: &[(f32, f32)]) -> (World, Vec<SessionLink>) {
        let (mut world, links) = world_with_players(positions.len() as u32);
        world.start_round().expect("round starts");
        world.walls.clear();
        for (id, &(x, y)) in positions.iter().enumerate() {
            let tank = world.tank_mut(id as SessionId).expect("player tank");
            tank.x = x;
            tank.y = y;
        }
        (world, links)
    }

    fn drain_warnings(link: &mut SessionLink) -> usize {
        let mut count = 0;
        while let Some(msg) = link.outgoing.try_pop_outgoing() {
            if matches!(msg, ServerMsg::Warning(_)) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn test_new_players_wait_dead() {
        let (world, _links) = world_with_players(2);
        assert_eq!(world.phase(), RoundPhase::WaitingForPlayers);
        assert_eq!(world.player_count(), 2);
        assert_eq!(world.alive_count(), 0);
    }

    #[test]
    fn test_start_round_layout_is_clear() {
        let (mut world, _links) = world_with_players(6);
        world.start_round().expect("round starts");
        let config = world.config().clone();

        assert!(world.is_ongoing());
        assert!((3..=7).contains(&world.walls().len()));
        assert_eq!(world.alive_count(), 6);

        let walls = world.walls();
        for (i, wall) in walls.iter().enumerate() {
            for other in &walls[i + 1..] {
                assert!(!overlaps(
                    &wall.polygon(0.0),
                    &other.polygon(config.wall_placement_padding),
                    None
                ));
            }
        }

        let tanks: Vec<&Tank> = world.players().map(|(_, p)| &p.tank).collect();
        for (i, tank) in tanks.iter().enumerate() {
            let poly = tank.polygon(&config);
            assert!(!PhysicsSystem::outside_map(&poly, &config));
            assert!(walls.iter().all(|w| !overlaps(&poly, &w.polygon(0.0), None)));
            for other in &tanks[i + 1..] {
                assert!(!overlaps(&poly, &other.polygon(&config), None));
            }
        }
    }

    #[test]
    fn test_impossible_layout_is_an_error() {
        let mut config = test_config();
        config.map_width = 30.0;
        config.map_height = 30.0;
        config.wall_placement_padding = 0.0;
        config.wall_short_side = (29.0, 30.0);
        config.wall_long_side = (29.0, 30.0);
        config.wall_count = (2, 2);
        config.placement_attempts = 50;

        let mut world = World::new(config);
        let result = world.start_round();
        assert!(matches!(
            result,
            Err(WorldError::PlacementExhausted { what: "wall", .. })
        ));
    }

    #[test]
    fn test_tick_is_noop_while_waiting() {
        let (mut world, links) = world_with_players(2);
        links[0].commands.try_push(Command::Go);
        world.tick(DT);
        assert_eq!(world.now(), 0.0);
        assert!(!world.tank(0).expect("tank").moving);
    }

    #[test]
    fn test_one_command_per_tick_rest_deferred() {
        let (mut world, links) = arena(&[(100.0, 100.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::Turn(1.0));
        links[0].commands.try_push(Command::Turn(2.0));

        world.tick(DT);
        assert_eq!(world.tank(0).expect("tank").heading, 1.0);
        world.tick(DT);
        assert_eq!(world.tank(0).expect("tank").heading, 2.0);
    }

    #[test]
    fn test_set_info_does_not_use_the_turn() {
        let (mut world, links) = arena(&[(100.0, 100.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::SetInfo("hello".to_string()));
        links[0].commands.try_push(Command::Go);

        world.tick(DT);
        let tank = world.tank(0).expect("tank");
        assert_eq!(tank.info, "hello");
        assert!(tank.moving);
    }

    #[test]
    fn test_second_fire_inside_reload_is_warned() {
        let (mut world, mut links) = arena(&[(100.0, 100.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::Fire(std::f32::consts::FRAC_PI_2));
        links[0].commands.try_push(Command::Fire(std::f32::consts::FRAC_PI_2));

        world.tick(DT);
        world.tick(DT);

        assert_eq!(world.shells().len(), 1);
        assert_eq!(drain_warnings(&mut links[0]), 1);
        assert_eq!(drain_warnings(&mut links[1]), 0);
        assert_eq!(world.tank(0).expect("tank").last_shot, Some(f64::from(DT)));
    }

    #[test]
    fn test_fire_allowed_again_after_reload() {
        let (mut world, mut links) = arena(&[(100.0, 250.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::Fire(std::f32::consts::FRAC_PI_2));
        world.tick(DT);

        for _ in 0..13 {
            world.tick(DT);
        }
        links[0].commands.try_push(Command::Fire(std::f32::consts::PI));
        world.tick(DT);

        assert_eq!(drain_warnings(&mut links[0]), 0);
        assert_eq!(world.shells().len(), 2);
    }

    #[test]
    fn test_moving_tank_stops_at_stationary_tank() {
        let (mut world, links) = arena(&[(100.0, 100.0), (112.0, 100.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::Go);

        // 3 units per tick; the 2 unit gap closes on the first tick
        world.tick(DT);
        let tank = world.tank(0).expect("tank");
        assert!(!tank.moving);
        assert_eq!(tank.x, 100.0);
    }

    #[test]
    fn test_later_mover_collides_with_earlier_mover() {
        // Tank 0 moves first into the gap; tank 1 then runs into it
        let (mut world, links) = arena(&[(100.0, 100.0), (118.0, 100.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::Go);
        links[1].commands.try_push(Command::Turn(std::f32::consts::PI));
        world.tick(DT);
        links[1].commands.try_push(Command::Go);
        world.tick(DT);

        let first = world.tank(0).expect("tank");
        let second = world.tank(1).expect("tank");
        assert!(first.moving);
        assert!(!second.moving);
        // Blocked by where tank 0 ended up, not where it started
        assert!((second.x - 118.0).abs() < 1e-3);
    }

    #[test]
    fn test_hit_kills_and_credits_shooter() {
        let (mut world, mut links) = arena(&[(200.0, 100.0), (100.0, 100.0), (400.0, 400.0)]);
        links[1].commands.try_push(Command::Fire(0.0));

        let mut ticks = 0;
        while world.tank(0).expect("tank").alive {
            world.tick(DT);
            ticks += 1;
            assert!(ticks < 20, "shell never arrived");
        }

        assert_eq!(world.tank(1).expect("shooter").kills, 1);
        assert!(world.shells().is_empty());
        assert_eq!(world.alive_count(), 2);
        assert!(world.is_ongoing());
        // Dead tanks stay where they died
        assert_eq!(world.tank(0).expect("tank").x, 200.0);
        assert_eq!(drain_warnings(&mut links[0]), 0);
    }

    #[test]
    fn test_own_shell_never_hits_shooter() {
        let (mut world, links) = arena(&[(100.0, 100.0), (400.0, 400.0)]);
        links[0].commands.try_push(Command::Fire(0.0));
        for _ in 0..3 {
            world.tick(DT);
        }
        assert!(world.tank(0).expect("tank").alive);
    }

    #[test]
    fn test_last_survivor_wins_round() {
        let (mut world, links) = arena(&[(200.0, 100.0), (100.0, 100.0)]);
        links[1].commands.try_push(Command::Fire(0.0));

        for _ in 0..20 {
            world.tick(DT);
            if !world.is_ongoing() {
                break;
            }
        }

        assert_eq!(world.phase(), RoundPhase::WaitingForPlayers);
        let winner = world.tank(1).expect("winner");
        assert_eq!(winner.wins, 1);
        assert!(!winner.alive);
        assert_eq!(world.tank(0).expect("loser").wins, 0);

        // Next round: wins carry over, everyone respawns
        world.start_round().expect("round starts");
        assert_eq!(world.alive_count(), 2);
        assert_eq!(world.tank(1).expect("winner").wins, 1);
        assert_eq!(world.tank(1).expect("winner").kills, 0);
    }

    #[test]
    fn test_disconnect_removes_tank_and_can_end_round() {
        let (mut world, _links) = arena(&[(100.0, 100.0), (400.0, 400.0), (250.0, 50.0)]);
        world.apply_event(RegistryEvent::Left { id: 2 });
        world.tick(DT);
        assert!(world.is_ongoing());
        assert!(world.tank(2).is_none());

        world.apply_event(RegistryEvent::Left { id: 1 });
        world.tick(DT);
        assert_eq!(world.phase(), RoundPhase::WaitingForPlayers);
        assert_eq!(world.tank(0).expect("survivor").wins, 1);
    }

    #[test]
    fn test_idle_drain_keeps_info_only() {
        let (mut world, links) = world_with_players(2);
        links[0].commands.try_push(Command::Go);
        links[0].commands.try_push(Command::SetInfo("ready".to_string()));
        links[0].commands.try_push(Command::Fire(0.0));

        world.discard_idle_commands();
        let tank = world.tank(0).expect("tank");
        assert_eq!(tank.info, "ready");
        assert!(!tank.moving);
        assert!(world.clients.get_mut(&0).expect("client").mailbox.pop_incoming_command().is_none());
    }

    #[test]
    fn test_observers_have_no_tank() {
        let (mut world, _links) = world_with_players(1);
        let (mailbox, _observer) = session_channel(1);
        world.add_client(1_000, Seat::Observer, mailbox);

        assert_eq!(world.player_count(), 1);
        assert!(world.tank(1_000).is_none());
    }
}
