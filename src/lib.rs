//! Sky Raid - simulation kernel for a vertical arcade shooter
//!
//! Core modules:
//! - `sim`: Per-tick simulation (pooling, spatial grid, collisions, governor)
//! - `config`: Device profiles and performance tuning
//!
//! Rendering, audio and input are external collaborators. They read entity
//! state and the governor outputs, and never mutate the world mid-tick.

pub mod config;
pub mod sim;

pub use config::{ConfigError, DeviceProfile, PerformanceConfig, SimConfig};
pub use sim::{FrameReport, RenderSurface, Simulation};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Default arena dimensions (logical units, origin top-left, y down)
    pub const ARENA_WIDTH: f32 = 375.0;
    pub const ARENA_HEIGHT: f32 = 667.0;

    /// Player defaults
    pub const PLAYER_WIDTH: f32 = 40.0;
    pub const PLAYER_HEIGHT: f32 = 40.0;
    /// Gap between the player and the bottom edge at spawn
    pub const PLAYER_BOTTOM_MARGIN: f32 = 30.0;
    pub const PLAYER_MAX_HEALTH: f32 = 100.0;
    /// Frames between automatic volleys
    pub const PLAYER_SHOOT_INTERVAL: u64 = 20;

    /// Player projectile
    pub const BULLET_WIDTH: f32 = 8.0;
    pub const BULLET_HEIGHT: f32 = 15.0;
    pub const BULLET_SPEED: f32 = 10.0;
    /// Spread volley angles in degrees from vertical
    pub const SPREAD_ANGLES_DEG: [f32; 5] = [-30.0, -15.0, 0.0, 15.0, 30.0];

    /// Hostile projectile
    pub const ENEMY_BULLET_WIDTH: f32 = 6.0;
    pub const ENEMY_BULLET_HEIGHT: f32 = 12.0;
    pub const ENEMY_BULLET_SPEED: f32 = 3.0;

    /// Pickup and special weapon
    pub const POWER_UP_SIZE: f32 = 20.0;
    pub const POWER_UP_SPEED: f32 = 2.0;
    pub const SUPER_WEAPON_SIZE: f32 = 30.0;
    pub const SUPER_WEAPON_SPEED: f32 = 1.0;

    /// Damage and rewards (player health is a percentage)
    pub const ENEMY_BULLET_DAMAGE: f32 = 20.0;
    pub const RAM_DAMAGE: f32 = 60.0;
    pub const KILL_HEAL: f32 = 1.0;
    pub const SUPER_WEAPON_BONUS: u64 = 100;

    /// Timed modes (milliseconds)
    pub const SPREAD_MODE_MS: f64 = 15_000.0;
    pub const OVERLOAD_MS: f64 = 3_000.0;

    /// Hostile generation cadence (frames)
    pub const ENEMY_GENERATE_INTERVAL: u64 = 30;

    /// Hostile movement
    pub const DASH_THRESHOLD_RATIO: f32 = 0.7;
    pub const DASH_MULTIPLIER: f32 = 1.1;
    pub const TRACKING_DISTANCE: f32 = 150.0;
    pub const BELOW_PLAYER_LIMIT: f32 = 30.0;

    /// Special weapon spawn window
    pub const SPECIAL_MIN_INTERVAL_MS: f64 = 20_000.0;
    pub const SPECIAL_MAX_INTERVAL_MS: f64 = 60_000.0;
    pub const SPECIAL_SPAWN_CHANCE: f64 = 0.001;

    /// Broad-phase grid. The query radius must not exceed the cell size.
    pub const GRID_CELL_SIZE: f32 = 64.0;
    pub const BROAD_PHASE_RADIUS: f32 = 64.0;
}

/// Center of a rectangle given its top-left corner and size
#[inline]
pub fn rect_center(pos: Vec2, size: Vec2) -> Vec2 {
    pos + size * 0.5
}

/// Unit direction for an angle measured clockwise from straight up (screen space, y down)
#[inline]
pub fn heading(angle: f32) -> Vec2 {
    Vec2::new(angle.sin(), -angle.cos())
}
