//! Connected clients: admission, per-session queues and liveness

pub mod liveness;
pub mod mailbox;
pub mod registry;

pub use liveness::{Liveness, LivenessAction};
pub use mailbox::{session_channel, CommandSender, Mailbox, OutgoingReceiver, SessionLink};
pub use registry::{RegistryEvent, Role, Seat, SessionGuard, SessionRegistry};

/// Identity of one live connection
///
/// Player ids index the display-name table; observer ids come from a disjoint range.
pub type SessionId = u32;
