//! Per-frame pipeline
//!
//! One call to `Simulation::tick` runs: advance frame, expire timed modes,
//! player volley, entity updates, queued spawns, hostile generation,
//! special-weapon check, collisions, cleanup, pool compaction, governor
//! sample, throttle. Rendering is left to the host, gated by the governor.

use glam::Vec2;

use super::collision::{CollisionReport, CollisionSystem};
use super::entity::{Entity, SpawnRequest};
use super::governor::{Evaluation, GovernorOutputs, PerformanceGovernor, ThrottleState};
use super::player::Player;
use super::world::{Diagnostics, WorldState};
use crate::config::SimConfig;
use crate::consts::*;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Touch point the player ship should center on
    pub target: Option<Vec2>,
    /// Start a new run before ticking
    pub restart: bool,
}

/// Summary of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Whether the host should draw this frame
    pub render: bool,
    pub collisions: CollisionReport,
    /// Present when this tick closed a governor window
    pub evaluation: Option<Evaluation>,
    /// Entities returned to the pool this tick
    pub released: usize,
    /// Pooled instances dropped by compaction this tick
    pub compacted: usize,
    pub game_over: bool,
}

/// Drawing collaborator. Only active, visible entities are passed in.
pub trait RenderSurface {
    fn draw_player(&mut self, player: &Player);
    fn draw_entity(&mut self, entity: &Entity);
}

/// The whole kernel: world, collision resolver and governor
#[derive(Debug)]
pub struct Simulation {
    world: WorldState,
    collisions: CollisionSystem,
    governor: PerformanceGovernor,
    config: SimConfig,
    spawns: Vec<SpawnRequest>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let mut world = WorldState::new(&config);
        // Seeds the arena with the player; the first run starts at epoch 1
        world.reset();
        Self {
            world,
            collisions: CollisionSystem::new(GRID_CELL_SIZE, BROAD_PHASE_RADIUS),
            governor: PerformanceGovernor::new(&config.performance),
            config,
            spawns: Vec::new(),
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn governor(&self) -> &PerformanceGovernor {
        &self.governor
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn outputs(&self) -> GovernorOutputs {
        self.governor.outputs()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.world.diagnostics()
    }

    /// Start a new run. The governor keeps measuring across runs.
    pub fn restart(&mut self) {
        self.spawns.clear();
        self.world.reset();
        let multiplier = self.governor.state().particle_multiplier();
        self.world.apply_particle_multiplier(multiplier);
    }

    pub fn move_player(&mut self, target: Vec2) {
        if self.world.game_over {
            return;
        }
        let arena = self.world.arena;
        self.world.player.move_to(target, arena);
    }

    /// Advance one frame using the host's monotonic clock
    pub fn tick(&mut self, input: &TickInput, now_ms: f64) -> FrameReport {
        if input.restart {
            self.restart();
        }
        if let Some(target) = input.target {
            self.move_player(target);
        }

        self.world.advance_frame();

        let mut collisions = CollisionReport::default();
        if !self.world.game_over {
            self.world.expire_modes(now_ms);
            self.world.fire_player_volley(now_ms);
            self.world.update_entities(&mut self.spawns);
            self.world.realize_spawns(&mut self.spawns);
            self.world.generate_enemies(now_ms);
            self.world.maybe_spawn_special(now_ms);
            collisions = self.collisions.resolve(&mut self.world, now_ms);
        }

        let mut released = self.world.cleanup();
        let mut compacted = 0;
        if self.world.frame % self.governor.compact_interval() == 0 {
            compacted += self.world.pool.force_compact();
        }

        let evaluation = self.governor.sample(now_ms, self.world.live_count());
        if let Some(eval) = &evaluation {
            let (r, c) = self.apply_throttle(eval);
            released += r;
            compacted += c;
        }

        FrameReport {
            frame: self.world.frame,
            render: self.should_render(),
            collisions,
            evaluation,
            released,
            compacted,
            game_over: self.world.game_over,
        }
    }

    /// Side effects of the governor's decision. Returns (released, compacted).
    fn apply_throttle(&mut self, eval: &Evaluation) -> (usize, usize) {
        match eval.state {
            ThrottleState::Normal => {
                if eval.changed() {
                    self.world.apply_particle_multiplier(1.0);
                }
                (0, 0)
            }
            ThrottleState::Reduced => {
                self.world
                    .apply_particle_multiplier(ThrottleState::Reduced.particle_multiplier());
                (self.world.cleanup(), self.world.pool.force_compact())
            }
            ThrottleState::Critical => {
                self.world
                    .apply_particle_multiplier(ThrottleState::Critical.particle_multiplier());
                let fraction = self.config.performance.critical_cull_fraction;
                let culled = self.world.cull_oldest_enemies(fraction);
                if culled > 0 {
                    log::debug!("Critical throttle culled {} hostiles", culled);
                }
                (self.world.cleanup(), self.world.pool.force_compact())
            }
        }
    }

    /// Whether the current frame is one the governor wants drawn
    pub fn should_render(&self) -> bool {
        let divisor = u64::from(self.governor.outputs().render_frequency_divisor.max(1));
        self.world.frame % divisor == 0
    }

    /// Draw the player and every active, visible entity. Returns false on
    /// frames the governor skips.
    pub fn render(&self, surface: &mut impl RenderSurface) -> bool {
        if !self.should_render() {
            return false;
        }
        surface.draw_player(&self.world.player);
        for entity in self.world.entities().filter(|e| e.active && e.visible) {
            surface.draw_entity(entity);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{EnemyClass, EntityKind};

    const FRAME_MS: f64 = 1000.0 / 60.0;

    #[derive(Default)]
    struct CountingSurface {
        players: usize,
        entities: usize,
    }

    impl RenderSurface for CountingSurface {
        fn draw_player(&mut self, _player: &Player) {
            self.players += 1;
        }

        fn draw_entity(&mut self, entity: &Entity) {
            assert!(entity.active && entity.visible);
            self.entities += 1;
        }
    }

    fn snapshot(sim: &Simulation) -> Vec<(u32, EntityKind, Vec2)> {
        sim.world().entities().map(|e| (e.id, e.kind, e.pos)).collect()
    }

    #[test]
    fn test_determinism() {
        let mut sim1 = Simulation::new(SimConfig::default());
        let mut sim2 = Simulation::new(SimConfig::default());

        for i in 0..900u32 {
            let input = TickInput {
                target: Some(Vec2::new(100.0 + (i % 150) as f32, 600.0)),
                ..Default::default()
            };
            let now = f64::from(i) * FRAME_MS;
            let r1 = sim1.tick(&input, now);
            let r2 = sim2.tick(&input, now);
            assert_eq!(r1, r2);
        }

        assert_eq!(sim1.world().score, sim2.world().score);
        assert_eq!(snapshot(&sim1), snapshot(&sim2));
    }

    #[test]
    fn test_pipeline_invariants_hold_every_tick() {
        let mut sim = Simulation::new(SimConfig::default());
        let max_pool = sim.config().performance.max_pool_size;
        let input = TickInput::default();

        for i in 0..3000u32 {
            sim.tick(&input, f64::from(i) * FRAME_MS);
            let world = sim.world();
            assert!(world.entities().all(|e| e.active));
            for kind in EntityKind::ALL {
                assert!(world.pool.bucket_len(kind) <= max_pool);
            }
            if world.game_over {
                break;
            }
        }
        assert!(sim.world().frame > 0);
    }

    #[test]
    fn test_volley_and_generation_cadence() {
        let mut sim = Simulation::new(SimConfig::default());
        let input = TickInput::default();
        let mut frame_of_first_shot = None;
        for i in 0..30u32 {
            let report = sim.tick(&input, f64::from(i) * FRAME_MS);
            if frame_of_first_shot.is_none() && !sim.world().bullets.is_empty() {
                frame_of_first_shot = Some(report.frame);
            }
        }
        assert_eq!(frame_of_first_shot, Some(PLAYER_SHOOT_INTERVAL));
        assert_eq!(sim.world().enemies.len(), 1);
    }

    #[test]
    fn test_slow_frames_throttle_and_recover() {
        let mut sim = Simulation::new(SimConfig::default());
        let input = TickInput::default();

        // 20 fps for just over five seconds
        let mut now = 0.0;
        while now <= 5000.0 {
            sim.tick(&input, now);
            now += 50.0;
        }
        assert_eq!(sim.governor().state(), ThrottleState::Critical);
        assert_eq!(sim.outputs().render_frequency_divisor, 3);
        assert!(sim.world().entities().all(|e| e.trail.is_empty()));
        assert!(sim.world().player.trail.is_empty());

        // Back to 60 fps
        let mut frames = 0u32;
        while frames < 6 * 60 + 1 {
            sim.tick(&input, now);
            now += FRAME_MS;
            frames += 1;
        }
        assert_eq!(sim.governor().state(), ThrottleState::Normal);
        assert_eq!(sim.world().particle_multiplier, 1.0);
    }

    #[test]
    fn test_game_over_freezes_world() {
        let mut sim = Simulation::new(SimConfig::default());
        let input = TickInput::default();
        sim.world_mut().spawn_enemy(EnemyClass::Bomber, 100.0);
        sim.world_mut().add_score(70);
        sim.world_mut().end_game();
        let before = snapshot(&sim);
        let player_pos = sim.world().player.pos;

        for i in 0..120u32 {
            let report = sim.tick(&input, f64::from(i) * FRAME_MS);
            assert!(report.game_over);
            assert_eq!(report.collisions, CollisionReport::default());
        }
        sim.move_player(Vec2::ZERO);
        assert_eq!(snapshot(&sim), before);
        assert_eq!(sim.world().player.pos, player_pos);
        assert_eq!(sim.world().high_score, 70);

        let report = sim.tick(
            &TickInput {
                restart: true,
                ..Default::default()
            },
            120.0 * FRAME_MS,
        );
        assert!(!report.game_over);
        assert_eq!(sim.world().score, 0);
        assert_eq!(sim.world().high_score, 70);
        assert!(sim.world().enemies.is_empty());
    }

    #[test]
    fn test_unvalidated_zero_cadence_keeps_ticking() {
        let mut config = SimConfig::default();
        config.performance.compact_cadence.normal = 0;
        assert!(config.validate().is_err());

        let mut sim = Simulation::new(config);
        let input = TickInput::default();
        for i in 0..120u32 {
            sim.tick(&input, f64::from(i) * FRAME_MS);
        }
        assert_eq!(sim.world().frame, 120);
    }

    #[test]
    fn test_render_gating() {
        let mut sim = Simulation::new(SimConfig::default());
        sim.world_mut().spawn_enemy(EnemyClass::SmallFighter, 10.0);
        sim.world_mut().spawn_power_up(Vec2::new(100.0, 100.0));
        sim.world_mut().power_ups[0].visible = false;

        let mut surface = CountingSurface::default();
        assert!(sim.render(&mut surface));
        assert_eq!(surface.players, 1);
        assert_eq!(surface.entities, 1);
    }

    #[test]
    fn test_diagnostics_expose_pool() {
        let mut sim = Simulation::new(SimConfig::default());
        let input = TickInput::default();
        for i in 0..300u32 {
            sim.tick(&input, f64::from(i) * FRAME_MS);
        }
        let diag = sim.diagnostics();
        assert_eq!(diag.pooled, sim.world().pool_stats().total);
        assert_eq!(diag.malformed_swept, 0);
    }
}
