//! Deterministic simulation kernel
//!
//! All gameplay logic lives here. Given the same seed, config and clock
//! readings, a run is reproducible:
//! - Seeded RNG only
//! - Stable iteration order (insertion order within each collection)
//! - No rendering or platform dependencies

pub mod collision;
pub mod entity;
pub mod governor;
pub mod grid;
pub mod player;
pub mod pool;
pub mod tick;
pub mod world;

pub use collision::{Aabb, CollisionReport, CollisionSystem};
pub use entity::{Behavior, ClassStats, EnemyClass, Entity, EntityKind, SpawnRequest, TrailParticle};
pub use governor::{Evaluation, GovernorOutputs, PerformanceGovernor, ThrottleState};
pub use grid::SpatialGrid;
pub use player::{ModeExpiry, Player, TimedEffect};
pub use pool::{EntityPool, PoolStats, Poolable, Release, Resettable};
pub use tick::{FrameReport, RenderSurface, Simulation, TickInput};
pub use world::{Diagnostics, WorldState};
