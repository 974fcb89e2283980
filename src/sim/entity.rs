//! Pooled entity kinds and their per-tick behavior
//!
//! Every transient object (projectiles, hostiles, pickups, special weapons)
//! is an `Entity`. Kind-specific state lives in `Behavior`. Instances cycle
//! through the pool forever: factory-built once, then re-initialized on
//! every acquisition and reset on every release.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use super::pool::{Poolable, Resettable};
use crate::consts::*;
use crate::{heading, rect_center};

/// Pooled entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Player projectile
    Bullet,
    /// Hostile projectile
    EnemyBullet,
    /// Hostile aircraft
    Enemy,
    /// Spread-shot pickup
    PowerUp,
    /// Screen-clearing special weapon
    SuperWeapon,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Bullet,
        EntityKind::EnemyBullet,
        EntityKind::Enemy,
        EntityKind::PowerUp,
        EntityKind::SuperWeapon,
    ];

    /// Pool bucket name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bullet => "bullet",
            EntityKind::EnemyBullet => "enemybullet",
            EntityKind::Enemy => "enemy",
            EntityKind::PowerUp => "powerup",
            EntityKind::SuperWeapon => "superweapon",
        }
    }
}

/// Hostile aircraft classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyClass {
    SmallFighter,
    MediumFighter,
    LargeFighter,
    Bomber,
    HeavyFighter,
}

/// Extra hit region around a hostile's wings, relative to its body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WingRegion {
    /// Horizontal overhang on each side of the body
    pub reach: f32,
    /// Extent above the body's vertical center
    pub above: f32,
    /// Extent below the body's vertical center
    pub below: f32,
}

/// Static per-class tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    pub size: f32,
    pub health: i32,
    pub speed: f32,
    pub score: u64,
    /// Frames between shots; `None` for classes that never fire
    pub shoot_interval: Option<u64>,
    /// Chance of dropping a pickup when destroyed
    pub drop_rate: f64,
    pub wing: WingRegion,
}

impl EnemyClass {
    pub const ALL: [EnemyClass; 5] = [
        EnemyClass::SmallFighter,
        EnemyClass::MediumFighter,
        EnemyClass::LargeFighter,
        EnemyClass::Bomber,
        EnemyClass::HeavyFighter,
    ];

    pub fn stats(self) -> ClassStats {
        match self {
            EnemyClass::SmallFighter => ClassStats {
                size: 25.0,
                health: 1,
                speed: 6.0,
                score: 10,
                shoot_interval: None,
                drop_rate: 0.0,
                wing: WingRegion { reach: 5.0, above: 3.0, below: 8.0 },
            },
            EnemyClass::MediumFighter => ClassStats {
                size: 35.0,
                health: 2,
                speed: 4.0,
                score: 20,
                shoot_interval: None,
                drop_rate: 0.0,
                wing: WingRegion { reach: 8.0, above: 3.0, below: 10.0 },
            },
            EnemyClass::LargeFighter => ClassStats {
                size: 45.0,
                health: 3,
                speed: 2.0,
                score: 30,
                shoot_interval: Some(90),
                drop_rate: 0.0,
                wing: WingRegion { reach: 12.0, above: 5.0, below: 15.0 },
            },
            EnemyClass::Bomber => ClassStats {
                size: 30.0,
                health: 2,
                speed: 3.0,
                score: 20,
                shoot_interval: None,
                drop_rate: 0.0,
                wing: WingRegion { reach: 5.0, above: 2.0, below: 2.0 },
            },
            EnemyClass::HeavyFighter => ClassStats {
                size: 40.0,
                health: 4,
                speed: 1.0,
                score: 40,
                shoot_interval: Some(60),
                drop_rate: 0.4,
                wing: WingRegion { reach: 15.0, above: 5.0, below: 8.0 },
            },
        }
    }
}

/// A short-lived exhaust particle (visual only)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailParticle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// 1.0 at birth, removed at 0
    pub life: f32,
    pub decay: f32,
    pub size: f32,
}

/// Kind-specific state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Behavior {
    Bullet {
        /// Radians clockwise from straight up
        angle: f32,
    },
    EnemyBullet,
    Enemy {
        class: EnemyClass,
        dashing: bool,
        last_shot_frame: u64,
        last_pos: Vec2,
    },
    PowerUp,
    SuperWeapon,
}

impl Behavior {
    fn blank(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Bullet => Behavior::Bullet { angle: 0.0 },
            EntityKind::EnemyBullet => Behavior::EnemyBullet,
            EntityKind::Enemy => Behavior::Enemy {
                class: EnemyClass::SmallFighter,
                dashing: false,
                last_shot_frame: 0,
                last_pos: Vec2::ZERO,
            },
            EntityKind::PowerUp => Behavior::PowerUp,
            EntityKind::SuperWeapon => Behavior::SuperWeapon,
        }
    }
}

/// Read-only inputs for one entity update
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext {
    pub frame: u64,
    pub arena: Vec2,
    pub game_over: bool,
    /// Player center, for homing hostiles
    pub player_center: Vec2,
    /// Player bottom edge
    pub player_bottom: f32,
}

/// New entities an update asks the world to create after the update pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnRequest {
    /// Hostile projectile centered horizontally on `muzzle`
    EnemyBullet { muzzle: Vec2 },
    /// Pickup centered on `at`
    PowerUp { at: Vec2 },
}

/// A pooled game object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub kind: EntityKind,
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    pub speed: f32,
    pub health: i32,
    /// Participates in simulation
    pub active: bool,
    /// Eligible for render
    pub visible: bool,
    pub behavior: Behavior,
    #[serde(skip)]
    pub trail: Vec<TrailParticle>,
    pub trail_budget: usize,
    /// Frame at which this instance was last spawned
    pub spawn_frame: u64,
}

impl Entity {
    /// Blank, inactive instance (the factory for every kind)
    pub fn new(id: u32, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            pos: Vec2::ZERO,
            size: Vec2::ZERO,
            speed: 0.0,
            health: 0,
            active: false,
            visible: false,
            behavior: Behavior::blank(kind),
            trail: Vec::new(),
            trail_budget: 0,
            spawn_frame: 0,
        }
    }

    fn activate(&mut self, frame: u64, trail_budget: usize) {
        self.active = true;
        self.visible = true;
        self.spawn_frame = frame;
        self.trail.clear();
        self.trail_budget = trail_budget;
    }

    /// Player projectile launched from `pos` (top-left) at `angle_deg` from vertical
    pub fn init_bullet(&mut self, pos: Vec2, angle_deg: f32, frame: u64, trail_budget: usize) {
        self.pos = pos;
        self.size = Vec2::new(BULLET_WIDTH, BULLET_HEIGHT);
        self.speed = BULLET_SPEED;
        self.health = 1;
        self.behavior = Behavior::Bullet {
            angle: angle_deg.to_radians(),
        };
        self.activate(frame, trail_budget);
    }

    /// Hostile projectile whose top edge is centered on `muzzle`
    pub fn init_enemy_bullet(&mut self, muzzle: Vec2, frame: u64, trail_budget: usize) {
        self.size = Vec2::new(ENEMY_BULLET_WIDTH, ENEMY_BULLET_HEIGHT);
        self.pos = Vec2::new(muzzle.x - self.size.x / 2.0, muzzle.y);
        self.speed = ENEMY_BULLET_SPEED;
        self.health = 1;
        self.behavior = Behavior::EnemyBullet;
        self.activate(frame, trail_budget);
    }

    /// Hostile entering from above the arena at horizontal offset `x`
    pub fn init_enemy(&mut self, class: EnemyClass, x: f32, frame: u64, trail_budget: usize) {
        let stats = class.stats();
        self.size = Vec2::splat(stats.size);
        self.pos = Vec2::new(x, -stats.size);
        self.speed = stats.speed;
        self.health = stats.health;
        self.behavior = Behavior::Enemy {
            class,
            dashing: false,
            last_shot_frame: 0,
            last_pos: self.pos,
        };
        self.activate(frame, trail_budget);
    }

    /// Pickup centered on `center`
    pub fn init_power_up(&mut self, center: Vec2, frame: u64) {
        self.size = Vec2::splat(POWER_UP_SIZE);
        self.pos = center - self.size / 2.0;
        self.speed = POWER_UP_SPEED;
        self.health = 1;
        self.behavior = Behavior::PowerUp;
        self.activate(frame, 0);
    }

    /// Special weapon centered on `center`
    pub fn init_super_weapon(&mut self, center: Vec2, frame: u64) {
        self.size = Vec2::splat(SUPER_WEAPON_SIZE);
        self.pos = center - self.size / 2.0;
        self.speed = SUPER_WEAPON_SPEED;
        self.health = 1;
        self.behavior = Behavior::SuperWeapon;
        self.activate(frame, 0);
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        rect_center(self.pos, self.size)
    }

    #[inline]
    pub fn hit_box(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    /// Hostile class, if this is a hostile
    pub fn enemy_class(&self) -> Option<EnemyClass> {
        match self.behavior {
            Behavior::Enemy { class, .. } => Some(class),
            _ => None,
        }
    }

    /// Secondary wing region for hostiles
    pub fn wing_box(&self) -> Option<Aabb> {
        let wing = self.enemy_class()?.stats().wing;
        let center_y = self.pos.y + self.size.y / 2.0;
        Some(Aabb::new(
            Vec2::new(self.pos.x - wing.reach, center_y - wing.above),
            Vec2::new(self.pos.x + self.size.x + wing.reach, center_y + wing.below),
        ))
    }

    /// Exact test against another box: body first, then wings
    pub fn hit_test(&self, other: &Aabb) -> bool {
        if self.hit_box().overlaps(other) {
            return true;
        }
        self.wing_box().is_some_and(|wings| wings.overlaps(other))
    }

    /// Stop participating in the simulation; removal happens at cleanup
    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Finite position and a positive, finite size
    pub fn is_well_formed(&self) -> bool {
        self.pos.is_finite() && self.size.is_finite() && self.size.x > 0.0 && self.size.y > 0.0
    }

    /// Change the trail budget, dropping the oldest particles above it
    pub fn set_trail_budget(&mut self, budget: usize) {
        self.trail_budget = budget;
        if self.trail.len() > budget {
            let excess = self.trail.len() - budget;
            self.trail.drain(..excess);
        }
    }

    fn emit_trail(&mut self, origin: Vec2, vel: Vec2, decay: f32, rng: &mut impl Rng) {
        if self.trail_budget == 0 {
            return;
        }
        if self.trail.len() >= self.trail_budget {
            self.trail.remove(0);
        }
        self.trail.push(TrailParticle {
            pos: origin,
            vel,
            life: 1.0,
            decay,
            size: rng.random_range(1.0..3.0),
        });
    }

    fn age_trail(&mut self) {
        for particle in &mut self.trail {
            particle.pos += particle.vel;
            particle.life -= particle.decay;
        }
        self.trail.retain(|p| p.life > 0.0);
    }

    /// Advance one tick. Inactive entities and a finished game are no-ops.
    pub fn update(&mut self, ctx: &UpdateContext, rng: &mut impl Rng) -> Option<SpawnRequest> {
        if ctx.game_over || !self.active {
            return None;
        }
        match self.behavior {
            Behavior::Bullet { angle } => {
                self.pos += heading(angle) * self.speed;
                let tail = Vec2::new(self.pos.x + self.size.x / 2.0, self.pos.y + self.size.y);
                let jitter = rng.random_range(-0.3f32..0.3);
                self.emit_trail(tail, Vec2::new(jitter, 1.0), 0.08, rng);
                self.age_trail();
                if self.pos.y < -self.size.y || self.pos.x < -self.size.x || self.pos.x > ctx.arena.x
                {
                    self.deactivate();
                }
                None
            }
            Behavior::EnemyBullet => {
                self.pos.y += self.speed;
                let vel = Vec2::new(rng.random_range(-0.5..0.5), rng.random_range(-0.5..0.5));
                self.emit_trail(self.center(), vel, 0.05, rng);
                self.age_trail();
                if self.pos.y > ctx.arena.y || self.pos.x < -self.size.x || self.pos.x > ctx.arena.x
                {
                    self.deactivate();
                }
                None
            }
            Behavior::Enemy { .. } => self.update_enemy(ctx, rng),
            Behavior::PowerUp | Behavior::SuperWeapon => {
                self.pos.y += self.speed;
                if self.pos.y > ctx.arena.y {
                    self.deactivate();
                }
                None
            }
        }
    }

    fn update_enemy(&mut self, ctx: &UpdateContext, rng: &mut impl Rng) -> Option<SpawnRequest> {
        let Behavior::Enemy {
            class,
            mut dashing,
            mut last_shot_frame,
            last_pos,
        } = self.behavior
        else {
            return None;
        };
        let stats = class.stats();

        // Exhaust from the nose while moving
        if self.pos != last_pos {
            let nose = Vec2::new(self.pos.x + self.size.x / 2.0, self.pos.y);
            let vel = Vec2::new(rng.random_range(-0.5..0.5), -rng.random_range(2.0f32..4.0));
            self.emit_trail(nose, vel, 0.03, rng);
        }
        self.age_trail();
        let last_pos = self.pos;

        if class == EnemyClass::SmallFighter
            && !dashing
            && self.pos.y >= ctx.arena.y * DASH_THRESHOLD_RATIO
        {
            dashing = true;
        }
        let speed = if dashing {
            self.speed * DASH_MULTIPLIER
        } else {
            self.speed
        };

        let to_player = ctx.player_center - self.center();
        let distance = to_player.length();
        let too_far_below = self.pos.y - ctx.player_bottom > BELOW_PLAYER_LIMIT;
        if distance > TRACKING_DISTANCE && !too_far_below {
            self.pos += to_player / distance * speed;
        } else {
            self.pos.y += speed;
        }

        let mut request = None;
        if let Some(interval) = stats.shoot_interval {
            if ctx.frame.saturating_sub(last_shot_frame) >= interval {
                request = Some(SpawnRequest::EnemyBullet {
                    muzzle: Vec2::new(self.pos.x + self.size.x / 2.0, self.pos.y + self.size.y),
                });
                last_shot_frame = ctx.frame;
            }
        }

        self.behavior = Behavior::Enemy {
            class,
            dashing,
            last_shot_frame,
            last_pos,
        };

        if self.pos.y > ctx.arena.y + self.size.y
            || self.pos.x < -self.size.x
            || self.pos.x > ctx.arena.x + self.size.x
        {
            self.deactivate();
        }
        request
    }
}

impl Resettable for Entity {
    fn reset(&mut self) {
        self.active = false;
        self.visible = false;
        self.trail.clear();
        self.health = 0;
        self.pos = Vec2::ZERO;
        self.behavior = Behavior::blank(self.kind);
    }
}

impl Poolable for Entity {
    fn pool_id(&self) -> u32 {
        self.id
    }
}
