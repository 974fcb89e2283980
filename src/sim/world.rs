//! World registry: live collections, counters and spawning
//!
//! The world owns every live entity, the pool they return to, and the seeded
//! RNG. Removal is two-phase: passes only deactivate, and `cleanup` moves
//! inactive entities back into the pool once the passes are done.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::{EnemyClass, Entity, EntityKind, SpawnRequest, UpdateContext};
use super::player::{ModeExpiry, Player};
use super::pool::{EntityPool, PoolStats};
use crate::config::{ParticleBudgets, SimConfig};
use crate::consts::*;

/// Degradation counters; nothing here is surfaced as an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Malformed entities filtered out during cleanup
    pub malformed_swept: u64,
    /// Timed modes dropped because they belonged to an earlier epoch
    pub stale_modes_discarded: u64,
    /// Releases dropped on a full bucket
    pub pool_discarded: u64,
    /// Double releases rejected
    pub pool_duplicates: u64,
    /// Instances currently parked across all buckets
    pub pooled: usize,
}

/// All live state for one run
#[derive(Debug)]
pub struct WorldState {
    pub arena: Vec2,
    pub player: Player,
    pub bullets: Vec<Entity>,
    pub enemy_bullets: Vec<Entity>,
    pub enemies: Vec<Entity>,
    pub power_ups: Vec<Entity>,
    pub super_weapons: Vec<Entity>,
    /// Ticks since the last reset
    pub frame: u64,
    pub game_over: bool,
    pub score: u64,
    /// Best score across resets
    pub high_score: u64,
    /// Incremented on every reset; timed modes from older epochs are inert
    pub epoch: u64,
    /// `None` until the first special-weapon check after a reset
    pub last_special_spawn_ms: Option<f64>,
    pub pool: EntityPool<EntityKind, Entity>,
    pub rng: Pcg32,
    /// Unthrottled per-kind trail budgets
    pub budgets: ParticleBudgets,
    /// Current throttle applied to `budgets`
    pub particle_multiplier: f32,
    pub max_enemies: usize,
    pub diagnostics: Diagnostics,
    next_id: u32,
    scratch: Vec<Entity>,
}

impl WorldState {
    pub fn new(config: &SimConfig) -> Self {
        let arena = Vec2::new(config.arena_width, config.arena_height);
        let perf = &config.performance;
        Self {
            arena,
            player: Player::new(arena, perf.particles.player),
            bullets: Vec::new(),
            enemy_bullets: Vec::new(),
            enemies: Vec::new(),
            power_ups: Vec::new(),
            super_weapons: Vec::new(),
            frame: 0,
            game_over: false,
            score: 0,
            high_score: 0,
            epoch: 0,
            last_special_spawn_ms: None,
            pool: EntityPool::new(perf.max_pool_size),
            rng: Pcg32::seed_from_u64(config.seed),
            budgets: perf.particles,
            particle_multiplier: 1.0,
            max_enemies: perf.max_enemies,
            diagnostics: Diagnostics::default(),
            next_id: 1,
            scratch: Vec::new(),
        }
    }

    /// Start a fresh run. Keeps the high score and the RNG stream.
    pub fn reset(&mut self) {
        for kind in EntityKind::ALL {
            self.collection_mut(kind).clear();
        }
        self.pool.clear();
        self.frame = 0;
        self.game_over = false;
        self.score = 0;
        self.epoch += 1;
        self.last_special_spawn_ms = None;
        self.player.init(self.arena);
        self.player
            .set_trail_budget(ParticleBudgets::scale(self.budgets.player, self.particle_multiplier));
        log::info!("World reset (epoch {}, high score {})", self.epoch, self.high_score);
    }

    /// Call exactly once per tick, before any entity update
    #[inline]
    pub fn advance_frame(&mut self) {
        self.frame += 1;
    }

    /// Enter the terminal state. Repeated calls are ignored.
    pub fn end_game(&mut self) {
        if self.game_over {
            return;
        }
        self.game_over = true;
        if self.score > self.high_score {
            self.high_score = self.score;
        }
        log::info!(
            "Game over at frame {}: score {} (high {})",
            self.frame,
            self.score,
            self.high_score
        );
    }

    pub fn add_score(&mut self, points: u64) {
        self.score += points;
    }

    pub fn collection(&self, kind: EntityKind) -> &Vec<Entity> {
        match kind {
            EntityKind::Bullet => &self.bullets,
            EntityKind::EnemyBullet => &self.enemy_bullets,
            EntityKind::Enemy => &self.enemies,
            EntityKind::PowerUp => &self.power_ups,
            EntityKind::SuperWeapon => &self.super_weapons,
        }
    }

    pub fn collection_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Bullet => &mut self.bullets,
            EntityKind::EnemyBullet => &mut self.enemy_bullets,
            EntityKind::Enemy => &mut self.enemies,
            EntityKind::PowerUp => &mut self.power_ups,
            EntityKind::SuperWeapon => &mut self.super_weapons,
        }
    }

    /// Every live entity, in kind order then insertion order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        EntityKind::ALL
            .into_iter()
            .flat_map(move |kind| self.collection(kind).iter())
    }

    /// Active entities across all collections
    pub fn live_count(&self) -> usize {
        self.entities().filter(|e| e.active).count()
    }

    pub fn active_enemies(&self) -> usize {
        self.enemies.iter().filter(|e| e.active).count()
    }

    /// Current (throttled) trail budget for a kind
    pub fn trail_budget(&self, kind: EntityKind) -> usize {
        ParticleBudgets::scale(self.budgets.for_kind(kind), self.particle_multiplier)
    }

    fn acquire(&mut self, kind: EntityKind) -> Entity {
        let next_id = &mut self.next_id;
        self.pool.acquire(kind, || {
            let id = *next_id;
            *next_id += 1;
            Entity::new(id, kind)
        })
    }

    fn spawn(&mut self, kind: EntityKind, init: impl FnOnce(&mut Entity, u64, usize)) -> u32 {
        let mut entity = self.acquire(kind);
        init(&mut entity, self.frame, self.trail_budget(kind));
        let id = entity.id;
        self.collection_mut(kind).push(entity);
        id
    }

    pub fn spawn_bullet(&mut self, pos: Vec2, angle_deg: f32) -> u32 {
        self.spawn(EntityKind::Bullet, |e, frame, budget| {
            e.init_bullet(pos, angle_deg, frame, budget)
        })
    }

    pub fn spawn_enemy_bullet(&mut self, muzzle: Vec2) -> u32 {
        self.spawn(EntityKind::EnemyBullet, |e, frame, budget| {
            e.init_enemy_bullet(muzzle, frame, budget)
        })
    }

    pub fn spawn_enemy(&mut self, class: EnemyClass, x: f32) -> u32 {
        self.spawn(EntityKind::Enemy, |e, frame, budget| {
            e.init_enemy(class, x, frame, budget)
        })
    }

    pub fn spawn_power_up(&mut self, center: Vec2) -> u32 {
        self.spawn(EntityKind::PowerUp, |e, frame, _| e.init_power_up(center, frame))
    }

    pub fn spawn_super_weapon(&mut self, center: Vec2) -> u32 {
        self.spawn(EntityKind::SuperWeapon, |e, frame, _| {
            e.init_super_weapon(center, frame)
        })
    }

    /// Fire the player's volley if one is due. Returns projectiles spawned.
    pub fn fire_player_volley(&mut self, now_ms: f64) -> usize {
        if self.game_over || !self.player.should_fire(self.frame) {
            return 0;
        }
        let angles = self.player.volley_angles(now_ms, self.epoch);
        let muzzle = self
            .player
            .muzzle(Vec2::new(BULLET_WIDTH, BULLET_HEIGHT));
        for &angle in angles {
            self.spawn_bullet(muzzle, angle);
        }
        angles.len()
    }

    /// Frames between hostile spawns, stretched as the sky fills up
    pub fn generation_interval(&self) -> u64 {
        match self.active_enemies() {
            n if n >= 8 => 60,
            n if n >= 5 => 45,
            _ => ENEMY_GENERATE_INTERVAL,
        }
    }

    /// Spawn a random hostile when the cadence allows. Suspended during overload.
    pub fn generate_enemies(&mut self, now_ms: f64) -> Option<u32> {
        if self.game_over || self.player.overload_active(now_ms, self.epoch) {
            return None;
        }
        if self.frame % self.generation_interval() != 0 {
            return None;
        }
        if self.active_enemies() >= self.max_enemies {
            return None;
        }
        let class = EnemyClass::ALL[self.rng.random_range(0..EnemyClass::ALL.len())];
        let span = (self.arena.x - class.stats().size).max(0.0);
        let x = (self.rng.random::<f32>() * span).floor();
        Some(self.spawn_enemy(class, x))
    }

    /// Rare special-weapon spawn: never before the minimum interval, always by
    /// the maximum, and with a small per-tick chance in between.
    pub fn maybe_spawn_special(&mut self, now_ms: f64) -> Option<u32> {
        if self.game_over {
            return None;
        }
        let Some(last) = self.last_special_spawn_ms else {
            self.last_special_spawn_ms = Some(now_ms);
            return None;
        };
        let elapsed = now_ms - last;
        if elapsed < SPECIAL_MIN_INTERVAL_MS {
            return None;
        }
        if elapsed < SPECIAL_MAX_INTERVAL_MS && !self.rng.random_bool(SPECIAL_SPAWN_CHANCE) {
            return None;
        }

        let span = (self.arena.x - SUPER_WEAPON_SIZE).max(0.0);
        let x = self.rng.random::<f32>() * span;
        let center = Vec2::new(x + SUPER_WEAPON_SIZE / 2.0, -SUPER_WEAPON_SIZE / 2.0);
        let id = self.spawn_super_weapon(center);
        self.last_special_spawn_ms = Some(now_ms);
        log::debug!("Special weapon {} spawned after {:.0} ms", id, elapsed);
        Some(id)
    }

    /// Advance every entity one tick, queueing the spawns they request
    pub fn update_entities(&mut self, requests: &mut Vec<SpawnRequest>) {
        let ctx = UpdateContext {
            frame: self.frame,
            arena: self.arena,
            game_over: self.game_over,
            player_center: self.player.center(),
            player_bottom: self.player.pos.y + self.player.size.y,
        };
        if ctx.game_over {
            return;
        }
        let WorldState {
            bullets,
            enemy_bullets,
            enemies,
            power_ups,
            super_weapons,
            player,
            rng,
            ..
        } = self;

        player.update_trail(rng);
        for collection in [bullets, enemy_bullets, enemies, power_ups, super_weapons] {
            for entity in collection.iter_mut() {
                if let Some(request) = entity.update(&ctx, rng) {
                    requests.push(request);
                }
            }
        }
    }

    /// Create the entities queued by `update_entities`
    pub fn realize_spawns(&mut self, requests: &mut Vec<SpawnRequest>) {
        for request in requests.drain(..) {
            match request {
                SpawnRequest::EnemyBullet { muzzle } => {
                    self.spawn_enemy_bullet(muzzle);
                }
                SpawnRequest::PowerUp { at } => {
                    self.spawn_power_up(at);
                }
            }
        }
    }

    /// Remove one entity by id and return it to the pool
    pub fn despawn(&mut self, kind: EntityKind, id: u32) -> bool {
        let collection = self.collection_mut(kind);
        let Some(index) = collection.iter().position(|e| e.id == id) else {
            return false;
        };
        let entity = collection.remove(index);
        self.pool.release(kind, entity);
        true
    }

    /// Move inactive and malformed entities back to the pool. Returns how many
    /// left the live collections.
    pub fn cleanup(&mut self) -> usize {
        let WorldState {
            bullets,
            enemy_bullets,
            enemies,
            power_ups,
            super_weapons,
            pool,
            scratch,
            diagnostics,
            ..
        } = self;

        let mut removed = 0;
        let collections = [
            (EntityKind::Bullet, bullets),
            (EntityKind::EnemyBullet, enemy_bullets),
            (EntityKind::Enemy, enemies),
            (EntityKind::PowerUp, power_ups),
            (EntityKind::SuperWeapon, super_weapons),
        ];
        for (kind, live) in collections {
            std::mem::swap(live, scratch);
            for entity in scratch.drain(..) {
                if entity.active && entity.is_well_formed() {
                    live.push(entity);
                    continue;
                }
                if entity.active {
                    diagnostics.malformed_swept += 1;
                    log::warn!("Swept malformed {} {}", kind.as_str(), entity.id);
                }
                pool.release(kind, entity);
                removed += 1;
            }
        }
        removed
    }

    /// Drop expired timed modes; stale ones are counted
    pub fn expire_modes(&mut self, now_ms: f64) -> ModeExpiry {
        let expiry = self.player.expire_modes(now_ms, self.epoch);
        if expiry.stale > 0 {
            self.diagnostics.stale_modes_discarded += u64::from(expiry.stale);
            log::debug!("Discarded {} stale timed modes", expiry.stale);
        }
        expiry
    }

    /// Rescale every trail budget. 0.0 clears all trails.
    pub fn apply_particle_multiplier(&mut self, multiplier: f32) {
        self.particle_multiplier = multiplier;
        let budgets = self.budgets;
        self.player
            .set_trail_budget(ParticleBudgets::scale(budgets.player, multiplier));
        for kind in EntityKind::ALL {
            let budget = ParticleBudgets::scale(budgets.for_kind(kind), multiplier);
            for entity in self.collection_mut(kind) {
                entity.set_trail_budget(budget);
            }
        }
    }

    /// Deactivate the oldest `fraction` of active hostiles (rounded up)
    pub fn cull_oldest_enemies(&mut self, fraction: f32) -> usize {
        let active = self.active_enemies();
        // Snap float noise (10 * 0.3 = 3.0000001) before taking the ceiling
        let exact = active as f64 * f64::from(fraction);
        let count = ((exact * 1000.0).round() / 1000.0).ceil() as usize;
        // Spawns append, so collection order is age order
        let mut culled = 0;
        for enemy in self.enemies.iter_mut().filter(|e| e.active).take(count) {
            enemy.deactivate();
            culled += 1;
        }
        culled
    }

    pub fn pool_stats(&self) -> PoolStats<EntityKind> {
        self.pool.stats()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let stats = self.pool.stats();
        Diagnostics {
            pool_discarded: stats.discarded,
            pool_duplicates: stats.duplicates,
            pooled: stats.total,
            ..self.diagnostics.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::player::TimedEffect;

    fn world() -> WorldState {
        WorldState::new(&SimConfig::default())
    }

    fn assert_inactive_absent(world: &WorldState) {
        for entity in world.entities() {
            assert!(entity.active, "inactive {} {} still live", entity.kind.as_str(), entity.id);
        }
    }

    #[test]
    fn test_reset_mid_flight() {
        let mut world = world();
        for i in 0..10 {
            world.spawn_enemy(EnemyClass::Bomber, i as f32 * 30.0);
        }
        world.score = 250;
        world.frame = 400;
        world.player.enable_spread(1_000.0, world.epoch);
        let stale = world.player.spread;

        world.reset();
        assert_eq!(world.active_enemies(), 0);
        assert!(world.enemies.is_empty());
        assert_eq!(world.score, 0);
        assert_eq!(world.frame, 0);
        assert_eq!(world.pool_stats().total, 0);
        assert!(world.player.spread.is_none());

        // A timer from the old world firing later changes nothing
        world.player.spread = stale;
        assert!(!world.player.spread_active(2_000.0, world.epoch));
        assert_eq!(world.fire_player_volley(2_000.0), 1);
        let expiry = world.expire_modes(2_000.0);
        assert_eq!(expiry.stale, 1);
        assert_eq!(world.diagnostics().stale_modes_discarded, 1);
    }

    #[test]
    fn test_high_score_survives_reset() {
        let mut world = world();
        world.add_score(300);
        world.end_game();
        assert!(world.game_over);
        assert_eq!(world.high_score, 300);

        world.reset();
        assert!(!world.game_over);
        world.add_score(100);
        world.end_game();
        assert_eq!(world.high_score, 300);
    }

    #[test]
    fn test_cleanup_returns_inactive_to_pool() {
        let mut world = world();
        let a = world.spawn_bullet(Vec2::new(10.0, 10.0), 0.0);
        let b = world.spawn_bullet(Vec2::new(20.0, 10.0), 0.0);
        let c = world.spawn_bullet(Vec2::new(30.0, 10.0), 0.0);
        world.bullets[1].deactivate();

        assert_eq!(world.cleanup(), 1);
        assert_inactive_absent(&world);
        let ids: Vec<u32> = world.bullets.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(world.pool.bucket_len(EntityKind::Bullet), 1);

        // Next spawn reuses the parked instance
        assert_eq!(world.spawn_bullet(Vec2::ZERO, 0.0), b);
    }

    #[test]
    fn test_cleanup_sweeps_malformed() {
        let mut world = world();
        world.spawn_enemy(EnemyClass::SmallFighter, 10.0);
        world.enemies[0].pos.y = f32::NAN;
        assert_eq!(world.cleanup(), 1);
        assert!(world.enemies.is_empty());
        assert_eq!(world.diagnostics().malformed_swept, 1);
    }

    #[test]
    fn test_enemy_leaving_arena_awards_nothing() {
        let mut world = world();
        world.spawn_enemy(EnemyClass::Bomber, 100.0);
        world.spawn_enemy(EnemyClass::MediumFighter, 100.0);
        world.enemies[0].pos = Vec2::new(100.0, ARENA_HEIGHT + 40.0);
        world.enemies[1].pos = Vec2::new(-200.0, 100.0);
        let health = world.player.health;

        let mut requests = Vec::new();
        world.update_entities(&mut requests);
        assert!(world.enemies.iter().all(|e| !e.active));

        assert_eq!(world.cleanup(), 2);
        assert!(world.enemies.is_empty());
        assert_eq!(world.score, 0);
        assert_eq!(world.player.health, health);
        assert_eq!(world.pool.bucket_len(EntityKind::Enemy), 2);
    }

    #[test]
    fn test_despawn_by_id() {
        let mut world = world();
        let id = world.spawn_power_up(Vec2::new(50.0, 50.0));
        assert!(world.despawn(EntityKind::PowerUp, id));
        assert!(!world.despawn(EntityKind::PowerUp, id));
        assert!(world.power_ups.is_empty());
        assert_eq!(world.pool.bucket_len(EntityKind::PowerUp), 1);
    }

    #[test]
    fn test_special_spawn_window() {
        let mut world = world();
        // First check only arms the timer
        assert!(world.maybe_spawn_special(0.0).is_none());
        assert!(world.maybe_spawn_special(SPECIAL_MIN_INTERVAL_MS - 1.0).is_none());
        // Past the maximum it always fires
        assert!(world.maybe_spawn_special(SPECIAL_MAX_INTERVAL_MS).is_some());
        assert_eq!(world.super_weapons.len(), 1);
        let special = &world.super_weapons[0];
        assert_eq!(special.pos.y, -SUPER_WEAPON_SIZE);
        assert!(special.pos.x >= 0.0 && special.pos.x <= ARENA_WIDTH - SUPER_WEAPON_SIZE);
        // Timer restarted
        assert!(world.maybe_spawn_special(SPECIAL_MAX_INTERVAL_MS + 1.0).is_none());
        assert_eq!(world.last_special_spawn_ms, Some(SPECIAL_MAX_INTERVAL_MS));
    }

    #[test]
    fn test_generation_respects_cap_and_overload() {
        let mut world = world();
        world.max_enemies = 2;
        world.frame = ENEMY_GENERATE_INTERVAL;
        assert!(world.generate_enemies(0.0).is_some());
        assert!(world.generate_enemies(0.0).is_some());
        assert!(world.generate_enemies(0.0).is_none());

        world.max_enemies = 20;
        world.frame += 1;
        assert!(world.generate_enemies(0.0).is_none());

        world.frame = ENEMY_GENERATE_INTERVAL * 2;
        world.player.enable_overload(0.0, world.epoch);
        assert!(world.generate_enemies(100.0).is_none());
        assert!(world.generate_enemies(OVERLOAD_MS).is_some());
        for enemy in &world.enemies {
            assert!(enemy.pos.x >= 0.0);
            assert!(enemy.pos.x + enemy.size.x <= ARENA_WIDTH);
        }
    }

    #[test]
    fn test_generation_interval_backs_off() {
        let mut world = world();
        assert_eq!(world.generation_interval(), 30);
        for _ in 0..5 {
            world.spawn_enemy(EnemyClass::Bomber, 0.0);
        }
        assert_eq!(world.generation_interval(), 45);
        for _ in 0..3 {
            world.spawn_enemy(EnemyClass::Bomber, 0.0);
        }
        assert_eq!(world.generation_interval(), 60);
    }

    #[test]
    fn test_volley_spread() {
        let mut world = world();
        world.frame = PLAYER_SHOOT_INTERVAL;
        assert_eq!(world.fire_player_volley(0.0), 1);
        world.player.enable_spread(0.0, world.epoch);
        assert_eq!(world.fire_player_volley(1.0), 5);
        assert_eq!(world.bullets.len(), 6);
        world.frame += 1;
        assert_eq!(world.fire_player_volley(2.0), 0);
    }

    #[test]
    fn test_cull_and_particle_throttle() {
        let mut world = world();
        for i in 0..10 {
            world.spawn_enemy(EnemyClass::Bomber, i as f32 * 20.0);
        }
        assert_eq!(world.cull_oldest_enemies(0.3), 3);
        let active: Vec<bool> = world.enemies.iter().map(|e| e.active).collect();
        assert_eq!(&active[..4], &[false, false, false, true]);

        world.apply_particle_multiplier(0.5);
        assert_eq!(world.enemies[5].trail_budget, 2);
        assert_eq!(world.player.trail_budget, 4);
        world.apply_particle_multiplier(0.0);
        assert!(world.entities().all(|e| e.trail_budget == 0 && e.trail.is_empty()));
        assert_eq!(world.trail_budget(EntityKind::Bullet), 0);
    }

    #[test]
    fn test_stale_effect_is_inert() {
        let effect = TimedEffect::new(0.0, 1_000.0, 0);
        assert!(effect.is_live(500.0, 0));
        assert!(!effect.is_live(500.0, 1));
    }
}
