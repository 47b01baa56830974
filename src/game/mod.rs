//! Arena simulation: geometry, entities, rules and the tick loop

pub mod clock;
pub mod collision;
pub mod combat;
pub mod entity;
pub mod physics;
pub mod snapshot;
pub mod world;

pub use clock::FrameClock;
pub use world::World;
