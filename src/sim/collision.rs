//! Collision detection and response
//!
//! Four passes per tick, always in this order:
//! 1. Player projectiles vs hostiles (grid accelerated)
//! 2. Hostile projectiles vs player
//! 3. Hostiles vs player (ramming)
//! 4. Player vs pickups and special weapons
//!
//! A pass that ends the game skips every pass after it.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::grid::SpatialGrid;
use super::world::WorldState;
use crate::consts::*;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box from a top-left corner and size
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    /// Overlap test with inclusive edges: boxes that only touch still collide
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// What one collision pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// Player projectiles that struck a hostile
    pub projectile_hits: u32,
    /// Hostiles destroyed by projectiles
    pub kills: u32,
    /// Score from kills and special weapons
    pub score_awarded: u64,
    /// Hostile projectiles that struck the player
    pub player_hits: u32,
    pub rams: u32,
    pub pickups: u32,
    pub specials: u32,
    /// Hostiles cleared by special weapons
    pub cleared: u32,
    /// Pickups dropped by destroyed hostiles
    pub drops: u32,
    pub player_died: bool,
}

/// Narrow-phase resolver with a reusable broad-phase grid
#[derive(Debug)]
pub struct CollisionSystem {
    grid: SpatialGrid<usize>,
    candidates: Vec<usize>,
    broad_radius: f32,
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new(GRID_CELL_SIZE, BROAD_PHASE_RADIUS)
    }
}

impl CollisionSystem {
    pub fn new(cell_size: f32, broad_radius: f32) -> Self {
        debug_assert!(broad_radius <= cell_size);
        Self {
            grid: SpatialGrid::new(cell_size),
            candidates: Vec::new(),
            broad_radius,
        }
    }

    /// Run every pass against the world. No-op once the game is over.
    pub fn resolve(&mut self, world: &mut WorldState, now_ms: f64) -> CollisionReport {
        let mut report = CollisionReport::default();
        if world.game_over {
            return report;
        }

        let drops = self.projectiles_vs_enemies(world, &mut report);
        if !self.enemy_bullets_vs_player(world, &mut report) {
            self.enemies_vs_player(world, &mut report);
        }
        if !world.game_over {
            self.player_vs_pickups(world, now_ms, &mut report);
        }

        for at in drops {
            world.spawn_power_up(at);
            report.drops += 1;
        }
        report
    }

    /// Returns the centers where pickups should drop
    fn projectiles_vs_enemies(
        &mut self,
        world: &mut WorldState,
        report: &mut CollisionReport,
    ) -> Vec<Vec2> {
        let WorldState {
            bullets,
            enemies,
            player,
            score,
            rng,
            ..
        } = world;

        self.grid.clear();
        for (index, enemy) in enemies.iter().enumerate() {
            if enemy.active {
                let c = enemy.center();
                self.grid.insert(index, c.x, c.y);
            }
        }

        let mut drops = Vec::new();
        if self.grid.is_empty() {
            return drops;
        }
        let radius_sq = self.broad_radius * self.broad_radius;

        for bullet in bullets.iter_mut().filter(|b| b.active) {
            let origin = bullet.center();
            let hit_box = bullet.hit_box();
            self.grid
                .query_into(origin.x, origin.y, self.broad_radius, &mut self.candidates);

            // First candidate in query order wins, not the nearest
            let target = self.candidates.iter().copied().find(|&index| {
                let enemy = &enemies[index];
                enemy.active
                    && enemy.center().distance_squared(origin) <= radius_sq
                    && enemy.hit_test(&hit_box)
            });
            let Some(index) = target else {
                continue;
            };

            bullet.deactivate();
            report.projectile_hits += 1;

            let enemy = &mut enemies[index];
            enemy.health -= 1;
            if enemy.health != 0 {
                continue;
            }

            // Health just crossed to zero: rewards fire here and only here
            enemy.deactivate();
            report.kills += 1;
            if let Some(class) = enemy.enemy_class() {
                let stats = class.stats();
                *score += stats.score;
                report.score_awarded += stats.score;
                if stats.drop_rate > 0.0 && rng.random_bool(stats.drop_rate) {
                    drops.push(enemy.center());
                }
            }
            player.heal(KILL_HEAL);
        }
        drops
    }

    /// Returns true if the player died
    fn enemy_bullets_vs_player(&mut self, world: &mut WorldState, report: &mut CollisionReport) -> bool {
        let player_box = world.player.hit_box();
        for shot in world.enemy_bullets.iter_mut().filter(|s| s.active) {
            if !shot.hit_box().overlaps(&player_box) {
                continue;
            }
            shot.deactivate();
            world.player.take_damage(ENEMY_BULLET_DAMAGE);
            report.player_hits += 1;
            if world.player.is_dead() {
                report.player_died = true;
                break;
            }
        }
        if report.player_died {
            world.end_game();
        }
        report.player_died
    }

    fn enemies_vs_player(&mut self, world: &mut WorldState, report: &mut CollisionReport) {
        let player_box = world.player.hit_box();
        let Some(enemy) = world
            .enemies
            .iter_mut()
            .find(|e| e.active && e.hit_test(&player_box))
        else {
            return;
        };

        // Rammer is destroyed outright and awards nothing
        enemy.deactivate();
        world.player.take_damage(RAM_DAMAGE);
        report.rams += 1;
        if world.player.is_dead() {
            report.player_died = true;
            world.end_game();
        }
    }

    fn player_vs_pickups(&mut self, world: &mut WorldState, now_ms: f64, report: &mut CollisionReport) {
        let player_box = world.player.hit_box();
        let epoch = world.epoch;

        for pickup in world.power_ups.iter_mut().filter(|p| p.active) {
            if pickup.hit_box().overlaps(&player_box) {
                pickup.deactivate();
                world.player.enable_spread(now_ms, epoch);
                report.pickups += 1;
            }
        }

        let mut triggered = 0;
        for special in world.super_weapons.iter_mut().filter(|s| s.active) {
            if special.hit_box().overlaps(&player_box) {
                special.deactivate();
                triggered += 1;
            }
        }
        for _ in 0..triggered {
            for enemy in world.enemies.iter_mut().filter(|e| e.active) {
                enemy.deactivate();
                report.cleared += 1;
            }
            world.add_score(SUPER_WEAPON_BONUS);
            world.player.enable_overload(now_ms, epoch);
            report.score_awarded += SUPER_WEAPON_BONUS;
            report.specials += 1;
        }
    }
}
