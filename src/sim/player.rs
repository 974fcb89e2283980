//! The player ship and its timed modes
//!
//! Timed modes are stored as an absolute expiry plus the world epoch they
//! were granted in. A mode from an earlier epoch never reads as active, so
//! nothing granted before a world reset can leak into the next run.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use super::entity::TrailParticle;
use crate::consts::*;
use crate::rect_center;

/// A mode that lasts until `expires_at_ms` within one world epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedEffect {
    pub expires_at_ms: f64,
    pub epoch: u64,
}

impl TimedEffect {
    pub fn new(now_ms: f64, duration_ms: f64, epoch: u64) -> Self {
        Self {
            expires_at_ms: now_ms + duration_ms,
            epoch,
        }
    }

    #[inline]
    pub fn is_stale(&self, epoch: u64) -> bool {
        self.epoch != epoch
    }

    #[inline]
    pub fn is_live(&self, now_ms: f64, epoch: u64) -> bool {
        !self.is_stale(epoch) && now_ms < self.expires_at_ms
    }
}

/// Outcome of pruning timed modes for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeExpiry {
    /// Modes that ran out normally
    pub expired: u32,
    /// Modes from an earlier epoch, dropped without effect
    pub stale: u32,
}

/// The player ship (not pooled; one per world)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    /// Health percentage, 0..=100
    pub health: f32,
    /// Five-way spread volley
    pub spread: Option<TimedEffect>,
    /// Hostile generation suspended after a special weapon
    pub overload: Option<TimedEffect>,
    #[serde(skip)]
    pub trail: Vec<TrailParticle>,
    pub trail_budget: usize,
}

impl Player {
    pub fn new(arena: Vec2, trail_budget: usize) -> Self {
        let mut player = Self {
            pos: Vec2::ZERO,
            size: Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT),
            health: PLAYER_MAX_HEALTH,
            spread: None,
            overload: None,
            trail: Vec::new(),
            trail_budget,
        };
        player.init(arena);
        player
    }

    /// Bottom-center spawn with full health and no modes
    pub fn init(&mut self, arena: Vec2) {
        self.pos = Vec2::new(
            arena.x / 2.0 - self.size.x / 2.0,
            arena.y - self.size.y - PLAYER_BOTTOM_MARGIN,
        );
        self.health = PLAYER_MAX_HEALTH;
        self.spread = None;
        self.overload = None;
        self.trail.clear();
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        rect_center(self.pos, self.size)
    }

    #[inline]
    pub fn hit_box(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    /// Center the ship on a touch point, clamped inside the arena
    pub fn move_to(&mut self, target: Vec2, arena: Vec2) {
        let max = (arena - self.size).max(Vec2::ZERO);
        self.pos = (target - self.size / 2.0).clamp(Vec2::ZERO, max);
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn heal(&mut self, amount: f32) {
        self.health = (self.health + amount).min(PLAYER_MAX_HEALTH);
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Grant (or extend) spread mode; replaces any running timer
    pub fn enable_spread(&mut self, now_ms: f64, epoch: u64) {
        self.spread = Some(TimedEffect::new(now_ms, SPREAD_MODE_MS, epoch));
    }

    pub fn enable_overload(&mut self, now_ms: f64, epoch: u64) {
        self.overload = Some(TimedEffect::new(now_ms, OVERLOAD_MS, epoch));
    }

    pub fn spread_active(&self, now_ms: f64, epoch: u64) -> bool {
        self.spread.is_some_and(|e| e.is_live(now_ms, epoch))
    }

    pub fn overload_active(&self, now_ms: f64, epoch: u64) -> bool {
        self.overload.is_some_and(|e| e.is_live(now_ms, epoch))
    }

    /// Drop expired and stale modes
    pub fn expire_modes(&mut self, now_ms: f64, epoch: u64) -> ModeExpiry {
        let mut result = ModeExpiry::default();
        for slot in [&mut self.spread, &mut self.overload] {
            if let Some(effect) = *slot {
                if effect.is_stale(epoch) {
                    result.stale += 1;
                    *slot = None;
                } else if now_ms >= effect.expires_at_ms {
                    result.expired += 1;
                    *slot = None;
                }
            }
        }
        result
    }

    /// Whether a volley is due this frame
    #[inline]
    pub fn should_fire(&self, frame: u64) -> bool {
        frame % PLAYER_SHOOT_INTERVAL == 0
    }

    /// Launch angles (degrees) for the current volley
    pub fn volley_angles(&self, now_ms: f64, epoch: u64) -> &'static [f32] {
        if self.spread_active(now_ms, epoch) {
            &SPREAD_ANGLES_DEG
        } else {
            &[0.0]
        }
    }

    /// Top-left spawn point for a projectile of `bullet_size`
    pub fn muzzle(&self, bullet_size: Vec2) -> Vec2 {
        Vec2::new(
            self.pos.x + self.size.x / 2.0 - bullet_size.x / 2.0,
            self.pos.y - 10.0,
        )
    }

    pub fn set_trail_budget(&mut self, budget: usize) {
        self.trail_budget = budget;
        if self.trail.len() > budget {
            let excess = self.trail.len() - budget;
            self.trail.drain(..excess);
        }
    }

    /// Engine exhaust below the ship
    pub fn update_trail(&mut self, rng: &mut impl Rng) {
        for particle in &mut self.trail {
            particle.pos += particle.vel;
            particle.life -= particle.decay;
        }
        self.trail.retain(|p| p.life > 0.0);

        if self.trail_budget == 0 {
            return;
        }
        if self.trail.len() >= self.trail_budget {
            self.trail.remove(0);
        }
        self.trail.push(TrailParticle {
            pos: Vec2::new(self.pos.x + self.size.x / 2.0, self.pos.y + self.size.y),
            vel: Vec2::new(rng.random_range(-0.5..0.5), rng.random_range(1.0..3.0)),
            life: 1.0,
            decay: 0.06,
            size: rng.random_range(1.0..3.0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn arena() -> Vec2 {
        Vec2::new(ARENA_WIDTH, ARENA_HEIGHT)
    }

    #[test]
    fn test_spawn_position() {
        let player = Player::new(arena(), 8);
        assert_eq!(player.pos.x, ARENA_WIDTH / 2.0 - PLAYER_WIDTH / 2.0);
        assert_eq!(player.pos.y, ARENA_HEIGHT - PLAYER_HEIGHT - PLAYER_BOTTOM_MARGIN);
        assert_eq!(player.health, PLAYER_MAX_HEALTH);
    }

    #[test]
    fn test_move_to_clamps() {
        let mut player = Player::new(arena(), 0);
        player.move_to(Vec2::new(-50.0, -50.0), arena());
        assert_eq!(player.pos, Vec2::ZERO);
        player.move_to(Vec2::new(1e6, 1e6), arena());
        assert_eq!(player.pos, arena() - player.size);
        player.move_to(Vec2::new(100.0, 200.0), arena());
        assert_eq!(player.center(), Vec2::new(100.0, 200.0));
    }

    #[test]
    fn test_damage_and_heal_are_clamped() {
        let mut player = Player::new(arena(), 0);
        player.heal(10.0);
        assert_eq!(player.health, PLAYER_MAX_HEALTH);
        player.take_damage(RAM_DAMAGE);
        player.take_damage(RAM_DAMAGE);
        assert_eq!(player.health, 0.0);
        assert!(player.is_dead());
    }

    #[test]
    fn test_spread_expires() {
        let mut player = Player::new(arena(), 0);
        player.enable_spread(1000.0, 0);
        assert!(player.spread_active(1000.0, 0));
        assert_eq!(player.volley_angles(1000.0, 0).len(), 5);
        assert!(!player.spread_active(1000.0 + SPREAD_MODE_MS, 0));

        let expiry = player.expire_modes(1000.0 + SPREAD_MODE_MS, 0);
        assert_eq!(expiry, ModeExpiry { expired: 1, stale: 0 });
        assert!(player.spread.is_none());
        assert_eq!(player.volley_angles(0.0, 0), &[0.0]);
    }

    #[test]
    fn test_stale_epoch_never_activates() {
        let mut player = Player::new(arena(), 0);
        player.enable_spread(0.0, 3);
        assert!(!player.spread_active(1.0, 4));
        let expiry = player.expire_modes(1.0, 4);
        assert_eq!(expiry, ModeExpiry { expired: 0, stale: 1 });
        assert!(player.spread.is_none());
    }

    #[test]
    fn test_should_fire_cadence() {
        let player = Player::new(arena(), 0);
        assert!(player.should_fire(0));
        assert!(!player.should_fire(1));
        assert!(player.should_fire(PLAYER_SHOOT_INTERVAL));
    }

    #[test]
    fn test_trail_budget() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut player = Player::new(arena(), 3);
        for _ in 0..10 {
            player.update_trail(&mut rng);
            assert!(player.trail.len() <= 3);
        }
        player.set_trail_budget(1);
        assert_eq!(player.trail.len(), 1);
    }
}
