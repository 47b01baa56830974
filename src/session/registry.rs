//! Session admission and id allocation
//!
//! The registry is shared by every connection handler. It only tracks which
//! ids are live and how many players are connected; the sessions themselves
//! are handed to the tick loop through [`RegistryEvent`]s.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ServerConfig;

use super::mailbox::{session_channel, Mailbox, SessionLink};
use super::SessionId;

/// Observer ids start here so they never collide with name-table indices
const OBSERVER_ID_BASE: SessionId = 1_000;

/// Which endpoint a connection arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Observer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Player => f.write_str("player"),
            Role::Observer => f.write_str("observer"),
        }
    }
}

/// What the tick loop needs to seat a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seat {
    Player { name: String },
    Observer,
}

/// Registry changes observed by the tick loop
#[derive(Debug)]
pub enum RegistryEvent {
    Joined {
        id: SessionId,
        seat: Seat,
        mailbox: Mailbox,
    },
    Left {
        id: SessionId,
    },
}

/// Reasons a connection is refused before registration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Server full; please try again later")]
    ArenaFull,

    #[error("No tank names left; please try again later")]
    NoFreeName,

    #[error("Server is shutting down")]
    Closed,
}

/// Live session ids and player count
pub struct SessionRegistry {
    live: DashMap<SessionId, Role>,
    players: AtomicUsize,
    observers: AtomicUsize,
    next_observer_id: AtomicU32,
    max_players: usize,
    names: Vec<String>,
    command_queue_capacity: usize,
    events: mpsc::UnboundedSender<RegistryEvent>,
}

impl SessionRegistry {
    /// Create the registry and the event stream consumed by the tick loop
    pub fn new(config: &ServerConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<RegistryEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let first_observer_id = OBSERVER_ID_BASE.max(config.tank_names.len() as SessionId);

        let registry = Arc::new(Self {
            live: DashMap::new(),
            players: AtomicUsize::new(0),
            observers: AtomicUsize::new(0),
            next_observer_id: AtomicU32::new(first_observer_id),
            max_players: config.max_players,
            names: config.tank_names.clone(),
            command_queue_capacity: config.command_queue_capacity,
            events,
        });
        (registry, events_rx)
    }

    /// Register a new connection
    ///
    /// Players need a free slot below `max_players` and a free name index.
    /// The returned guard releases everything when dropped.
    pub fn admit(self: &Arc<Self>, role: Role) -> Result<SessionGuard, AdmissionError> {
        let (id, seat) = match role {
            Role::Player => {
                let id = self.claim_player_id()?;
                (id, Seat::Player { name: self.names[id as usize].clone() })
            }
            Role::Observer => {
                let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
                self.live.insert(id, Role::Observer);
                self.observers.fetch_add(1, Ordering::AcqRel);
                (id, Seat::Observer)
            }
        };

        let (mailbox, link) = session_channel(self.command_queue_capacity);
        let guard = SessionGuard {
            id,
            role,
            link: Some(link),
            registry: Arc::clone(self),
        };

        // On failure the guard is dropped here, which undoes the claim
        self.events
            .send(RegistryEvent::Joined { id, seat, mailbox })
            .map_err(|_| AdmissionError::Closed)?;

        info!(session_id = id, role = %role, "Session registered");
        Ok(guard)
    }

    /// Connected players
    pub fn player_count(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }

    /// Connected observers
    pub fn observer_count(&self) -> usize {
        self.observers.load(Ordering::Relaxed)
    }

    fn claim_player_id(&self) -> Result<SessionId, AdmissionError> {
        self.players
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < self.max_players).then_some(count + 1)
            })
            .map_err(|_| AdmissionError::ArenaFull)?;

        let mut candidates: Vec<SessionId> = (0..self.names.len() as SessionId).collect();
        candidates.shuffle(&mut rand::thread_rng());

        let claimed = candidates
            .into_iter()
            .find(|id| match self.live.entry(*id) {
                Entry::Vacant(slot) => {
                    slot.insert(Role::Player);
                    true
                }
                Entry::Occupied(_) => false,
            });

        claimed.ok_or_else(|| {
            self.players.fetch_sub(1, Ordering::AcqRel);
            AdmissionError::NoFreeName
        })
    }

    fn release(&self, id: SessionId, role: Role) {
        if self.live.remove(&id).is_none() {
            return;
        }
        match role {
            Role::Player => self.players.fetch_sub(1, Ordering::AcqRel),
            Role::Observer => self.observers.fetch_sub(1, Ordering::AcqRel),
        };
        // Tick loop already gone during shutdown
        let _ = self.events.send(RegistryEvent::Left { id });
        debug!(session_id = id, role = %role, "Session released");
    }
}

/// Ownership of a registered session
///
/// Dropping it frees the id (and player slot) and tells the tick loop to
/// remove the session, exactly once.
pub struct SessionGuard {
    id: SessionId,
    role: Role,
    link: Option<SessionLink>,
    registry: Arc<SessionRegistry>,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The connection's ends of the session queues (only available once)
    pub fn take_link(&mut self) -> Option<SessionLink> {
        self.link.take()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.release(self.id, self.role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_players: usize, names: usize) -> ServerConfig {
        ServerConfig {
            max_players,
            tank_names: (0..names).map(|i| format!("Tank {}", i)).collect(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_player_ids_index_name_table() {
        let (registry, mut events) = SessionRegistry::new(&config(3, 3));
        let guard = registry.admit(Role::Player).expect("admitted");
        assert!(guard.id() < 3);

        match events.try_recv() {
            Ok(RegistryEvent::Joined { id, seat, .. }) => {
                assert_eq!(id, guard.id());
                assert_eq!(seat, Seat::Player { name: format!("Tank {}", id) });
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_full_arena_rejects_players_but_not_observers() {
        let (registry, _events) = SessionRegistry::new(&config(2, 10));
        let _a = registry.admit(Role::Player).expect("first");
        let _b = registry.admit(Role::Player).expect("second");

        assert_eq!(registry.admit(Role::Player).err(), Some(AdmissionError::ArenaFull));
        assert_eq!(registry.player_count(), 2);

        let observer = registry.admit(Role::Observer).expect("observer");
        assert!(observer.id() >= OBSERVER_ID_BASE);
        assert_eq!(registry.observer_count(), 1);
    }

    #[test]
    fn test_counts_are_independent_per_role() {
        let (registry, _events) = SessionRegistry::new(&config(2, 2));
        let observer = registry.admit(Role::Observer).expect("observer");
        let _player = registry.admit(Role::Player).expect("player");
        let _a = registry.admit(Role::Player).expect("player");

        // A refused player claims and returns a slot without touching observers
        assert_eq!(registry.admit(Role::Player).err(), Some(AdmissionError::ArenaFull));
        assert_eq!(registry.observer_count(), 1);
        assert_eq!(registry.player_count(), 2);

        drop(observer);
        assert_eq!(registry.observer_count(), 0);
        assert_eq!(registry.player_count(), 2);
    }

    #[test]
    fn test_exhausted_name_table_rejects_player() {
        let (registry, _events) = SessionRegistry::new(&config(5, 2));
        let _a = registry.admit(Role::Player).expect("first");
        let _b = registry.admit(Role::Player).expect("second");

        assert_eq!(registry.admit(Role::Player).err(), Some(AdmissionError::NoFreeName));
        // The refused attempt gave its slot back
        assert_eq!(registry.player_count(), 2);
    }

    #[test]
    fn test_live_ids_are_unique() {
        let (registry, _events) = SessionRegistry::new(&config(10, 10));
        let guards: Vec<_> = (0..10)
            .map(|_| registry.admit(Role::Player).expect("admitted"))
            .collect();

        let mut ids: Vec<_> = guards.iter().map(|g| g.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let (registry, mut events) = SessionRegistry::new(&config(1, 1));
        let guard = registry.admit(Role::Player).expect("admitted");
        let id = guard.id();
        assert!(matches!(events.try_recv(), Ok(RegistryEvent::Joined { .. })));

        drop(guard);
        assert_eq!(registry.player_count(), 0);
        assert!(matches!(events.try_recv(), Ok(RegistryEvent::Left { id: left }) if left == id));
        assert!(events.try_recv().is_err());

        // The slot and the name are free again
        let again = registry.admit(Role::Player).expect("readmitted");
        assert_eq!(again.id(), id);
    }

    #[test]
    fn test_admission_fails_when_tick_loop_gone() {
        let (registry, events) = SessionRegistry::new(&config(2, 2));
        drop(events);

        assert_eq!(registry.admit(Role::Player).err(), Some(AdmissionError::Closed));
        assert_eq!(registry.player_count(), 0);
    }
}
