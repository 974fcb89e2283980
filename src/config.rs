//! Simulation configuration and device profiles
//!
//! Defaults describe a desktop-class device. Profiles lower budgets for
//! phones and low-memory hardware the same way across every subsystem.

use serde::{Deserialize, Serialize};

use crate::consts::{ARENA_HEIGHT, ARENA_WIDTH};
use crate::sim::entity::EntityKind;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// JSON parse or serialization failure
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of its allowed range
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Device class presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceProfile {
    #[default]
    Desktop,
    Mobile,
    LowMemory,
}

impl DeviceProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "Desktop",
            DeviceProfile::Mobile => "Mobile",
            DeviceProfile::LowMemory => "LowMemory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "desktop" => Some(DeviceProfile::Desktop),
            "mobile" | "phone" => Some(DeviceProfile::Mobile),
            "lowmemory" | "low-memory" | "low_memory" => Some(DeviceProfile::LowMemory),
            _ => None,
        }
    }
}

/// Maximum trail particles per entity, by owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleBudgets {
    pub player: usize,
    pub enemy: usize,
    pub bullet: usize,
    pub enemy_bullet: usize,
}

impl Default for ParticleBudgets {
    fn default() -> Self {
        Self {
            player: 8,
            enemy: 5,
            bullet: 6,
            enemy_bullet: 4,
        }
    }
}

impl ParticleBudgets {
    /// Trails are disabled entirely
    pub const NONE: Self = Self {
        player: 0,
        enemy: 0,
        bullet: 0,
        enemy_bullet: 0,
    };

    /// Base budget for a pooled entity kind (pickups carry no trail)
    pub fn for_kind(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Bullet => self.bullet,
            EntityKind::EnemyBullet => self.enemy_bullet,
            EntityKind::Enemy => self.enemy,
            EntityKind::PowerUp | EntityKind::SuperWeapon => 0,
        }
    }

    /// Apply a throttle multiplier to a base budget (rounds down)
    pub fn scale(base: usize, multiplier: f32) -> usize {
        (base as f32 * multiplier.clamp(0.0, 1.0)).floor() as usize
    }
}

/// Render every N-th tick, per throttle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFrequency {
    pub normal: u32,
    pub reduced: u32,
    pub minimal: u32,
}

impl Default for RenderFrequency {
    fn default() -> Self {
        Self {
            normal: 1,
            reduced: 2,
            minimal: 3,
        }
    }
}

/// Frames between forced pool compactions, per throttle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactCadence {
    pub normal: u64,
    pub reduced: u64,
    pub critical: u64,
}

impl Default for CompactCadence {
    fn default() -> Self {
        Self {
            normal: 600,
            reduced: 300,
            critical: 120,
        }
    }
}

/// Performance tuning consumed by the pool, world and governor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub target_fps: u32,
    /// Smoothed FPS below this drops to `Reduced`
    pub low_fps_threshold: f32,
    /// Smoothed FPS below this drops to `Critical`
    pub critical_fps_threshold: f32,
    /// Live entity count above this drops to `Reduced`
    pub max_objects_threshold: usize,
    /// Bucket cap per entity kind
    pub max_pool_size: usize,
    /// Simultaneous hostile cap for the generator
    pub max_enemies: usize,
    pub particles: ParticleBudgets,
    pub render_frequency: RenderFrequency,
    /// Length of one FPS sampling window
    pub sample_window_ms: f64,
    /// Number of per-window samples averaged into smoothed FPS
    pub history_len: usize,
    /// Share of the oldest hostiles culled while `Critical`
    pub critical_cull_fraction: f32,
    pub compact_cadence: CompactCadence,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            low_fps_threshold: 50.0,
            critical_fps_threshold: 30.0,
            max_objects_threshold: 100,
            max_pool_size: 50,
            max_enemies: 15,
            particles: ParticleBudgets::default(),
            render_frequency: RenderFrequency::default(),
            sample_window_ms: 1000.0,
            history_len: 5,
            critical_cull_fraction: 0.3,
            compact_cadence: CompactCadence::default(),
        }
    }
}

impl PerformanceConfig {
    /// Create a config with the profile's adjustments applied
    pub fn for_profile(profile: DeviceProfile) -> Self {
        let mut config = Self::default();
        config.apply_profile(profile);
        config
    }

    /// Apply a device profile on top of the current values
    pub fn apply_profile(&mut self, profile: DeviceProfile) {
        match profile {
            DeviceProfile::Desktop => {}
            DeviceProfile::Mobile => {
                // Phones trade trails and density for frame rate
                self.particles = ParticleBudgets::NONE;
                self.max_enemies = 8;
                self.max_pool_size = 30;
                self.low_fps_threshold = 40.0;
                self.critical_fps_threshold = 25.0;
                self.max_objects_threshold = 80;
            }
            DeviceProfile::LowMemory => {
                self.max_pool_size = 20;
                self.max_objects_threshold = 40;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_fps == 0 {
            return Err(invalid("target_fps", "must be positive"));
        }
        if !(self.critical_fps_threshold >= 0.0) {
            return Err(invalid("critical_fps_threshold", "must be non-negative"));
        }
        if self.critical_fps_threshold > self.low_fps_threshold {
            return Err(invalid(
                "critical_fps_threshold",
                format!(
                    "{} exceeds low_fps_threshold {}",
                    self.critical_fps_threshold, self.low_fps_threshold
                ),
            ));
        }
        if self.max_pool_size == 0 {
            return Err(invalid("max_pool_size", "must be positive"));
        }
        let freq = self.render_frequency;
        if freq.normal == 0 || freq.reduced == 0 || freq.minimal == 0 {
            return Err(invalid("render_frequency", "divisors must be at least 1"));
        }
        if !(self.sample_window_ms > 0.0) {
            return Err(invalid("sample_window_ms", "must be positive"));
        }
        if self.history_len == 0 {
            return Err(invalid("history_len", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.critical_cull_fraction) {
            return Err(invalid("critical_cull_fraction", "must be within 0..=1"));
        }
        let cadence = self.compact_cadence;
        if cadence.normal == 0 || cadence.reduced == 0 || cadence.critical == 0 {
            return Err(invalid("compact_cadence", "intervals must be positive"));
        }
        Ok(())
    }
}

/// Top-level simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed for spawns, drops and trails
    pub seed: u64,
    pub arena_width: f32,
    pub arena_height: f32,
    pub profile: DeviceProfile,
    pub performance: PerformanceConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            arena_width: ARENA_WIDTH,
            arena_height: ARENA_HEIGHT,
            profile: DeviceProfile::Desktop,
            performance: PerformanceConfig::default(),
        }
    }
}

impl SimConfig {
    /// Create a config for a device profile
    pub fn from_profile(profile: DeviceProfile) -> Self {
        Self {
            profile,
            performance: PerformanceConfig::for_profile(profile),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.arena_width > 0.0) || !(self.arena_height > 0.0) {
            return Err(invalid("arena", "width and height must be positive"));
        }
        self.performance.validate()
    }
}
