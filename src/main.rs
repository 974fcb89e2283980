//! Sky Raid headless driver
//!
//! Runs the kernel against a scripted clock: a steady stretch, a slow stretch
//! that forces the governor to throttle, then recovery. Progress goes to the
//! log (`RUST_LOG=info` or `debug`).

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use sky_raid::sim::{EntityKind, TickInput};
    use sky_raid::{SimConfig, Simulation};

    env_logger::init();

    let mut config = SimConfig::default();
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse::<u64>() {
            Ok(seed) => config.seed = seed,
            Err(err) => log::warn!("Ignoring seed {:?}: {}", arg, err),
        }
    }
    log::info!("Sky Raid (headless) starting with seed {}", config.seed);

    let mut sim = Simulation::new(config);

    // (frame interval ms, duration ms): 60 fps, 20 fps, 60 fps
    let script = [(1000.0 / 60.0, 10_000.0), (50.0, 6_000.0), (1000.0 / 60.0, 8_000.0)];
    let mut now = 0.0;
    let mut rendered = 0u64;
    let mut input = TickInput::default();

    for (step, duration) in script {
        let end = now + duration;
        while now < end {
            // Sweep the ship back and forth along the bottom
            let t = (now / 1000.0) as f32;
            let arena = sim.world().arena;
            input.target = Some(glam::Vec2::new(
                arena.x / 2.0 + t.sin() * arena.x * 0.4,
                arena.y - 50.0,
            ));
            input.restart = sim.world().game_over;

            let report = sim.tick(&input, now);
            if report.render {
                rendered += 1;
            }
            if let Some(eval) = report.evaluation {
                log::debug!(
                    "t={:.1}s fps={:.0} smoothed={:.1} live={} state={}",
                    now / 1000.0,
                    eval.sampled_fps,
                    eval.smoothed_fps,
                    eval.live_entities,
                    eval.state.as_str()
                );
            }
            now += step;
        }
        log::info!(
            "t={:.1}s governor={} score={} high={}",
            now / 1000.0,
            sim.governor().state().as_str(),
            sim.world().score,
            sim.world().high_score
        );
    }

    let stats = sim.world().pool_stats();
    for kind in EntityKind::ALL {
        log::info!("pool {}: {}", kind.as_str(), stats.count(&kind));
    }
    let diag = sim.diagnostics();
    log::info!(
        "frames={} rendered={} pooled={} discarded={} duplicates={} malformed={} stale={}",
        sim.world().frame,
        rendered,
        diag.pooled,
        diag.pool_discarded,
        diag.pool_duplicates,
        diag.malformed_swept,
        diag.stale_modes_discarded
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The kernel is driven by the host page's frame callback on the web
}
