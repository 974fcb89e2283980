//! Closed-loop frame-rate governor
//!
//! Counts ticks per sampling window, averages the last few windows, and maps
//! the smoothed rate (plus the live entity count) onto a throttle state. The
//! governor only decides; the simulation applies the side effects.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::PerformanceConfig;

/// Throttle level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrottleState {
    #[default]
    Normal,
    Reduced,
    Critical,
}

impl ThrottleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleState::Normal => "normal",
            ThrottleState::Reduced => "reduced",
            ThrottleState::Critical => "critical",
        }
    }

    /// Scale applied to every trail budget
    pub fn particle_multiplier(&self) -> f32 {
        match self {
            ThrottleState::Normal => 1.0,
            ThrottleState::Reduced => 0.5,
            ThrottleState::Critical => 0.0,
        }
    }
}

/// Read-only snapshot for the render collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GovernorOutputs {
    pub state: ThrottleState,
    /// Render every N-th tick
    pub render_frequency_divisor: u32,
    pub particle_budget_multiplier: f32,
}

/// Result of closing one sampling window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub previous: ThrottleState,
    pub state: ThrottleState,
    /// FPS measured over the window just closed
    pub sampled_fps: f32,
    /// Mean of the retained samples
    pub smoothed_fps: f32,
    pub live_entities: usize,
}

impl Evaluation {
    pub fn changed(&self) -> bool {
        self.previous != self.state
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceGovernor {
    config: PerformanceConfig,
    window_start_ms: Option<f64>,
    frames_in_window: u32,
    history: VecDeque<f32>,
    state: ThrottleState,
}

impl PerformanceGovernor {
    pub fn new(config: &PerformanceConfig) -> Self {
        Self {
            config: config.clone(),
            window_start_ms: None,
            frames_in_window: 0,
            history: VecDeque::with_capacity(config.history_len),
            state: ThrottleState::Normal,
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    /// Mean of the retained samples, or the target rate before the first window closes
    pub fn smoothed_fps(&self) -> f32 {
        if self.history.is_empty() {
            return self.config.target_fps as f32;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    pub fn outputs(&self) -> GovernorOutputs {
        let freq = self.config.render_frequency;
        GovernorOutputs {
            state: self.state,
            render_frequency_divisor: match self.state {
                ThrottleState::Normal => freq.normal,
                ThrottleState::Reduced => freq.reduced,
                ThrottleState::Critical => freq.minimal,
            },
            particle_budget_multiplier: self.state.particle_multiplier(),
        }
    }

    /// Frames between forced pool compactions in the current state (at least 1)
    pub fn compact_interval(&self) -> u64 {
        let cadence = self.config.compact_cadence;
        let interval = match self.state {
            ThrottleState::Normal => cadence.normal,
            ThrottleState::Reduced => cadence.reduced,
            ThrottleState::Critical => cadence.critical,
        };
        interval.max(1)
    }

    /// Record one tick at `now_ms`. Returns an evaluation when this tick
    /// closes a sampling window; the tick itself counts toward the next one.
    pub fn sample(&mut self, now_ms: f64, live_entities: usize) -> Option<Evaluation> {
        let start = *self.window_start_ms.get_or_insert(now_ms);
        let elapsed = now_ms - start;

        let mut evaluation = None;
        if elapsed >= self.config.sample_window_ms {
            let scale = 1000.0 / self.config.sample_window_ms;
            let sampled_fps = (f64::from(self.frames_in_window) * scale) as f32;
            self.history.push_back(sampled_fps);
            while self.history.len() > self.config.history_len {
                self.history.pop_front();
            }
            evaluation = Some(self.evaluate(sampled_fps, live_entities));
            self.window_start_ms = Some(now_ms);
            self.frames_in_window = 0;
        }

        self.frames_in_window += 1;
        evaluation
    }

    fn evaluate(&mut self, sampled_fps: f32, live_entities: usize) -> Evaluation {
        let smoothed_fps = self.smoothed_fps();
        let previous = self.state;
        let overloaded = live_entities > self.config.max_objects_threshold;

        self.state = if smoothed_fps < self.config.critical_fps_threshold {
            ThrottleState::Critical
        } else if smoothed_fps < self.config.low_fps_threshold || overloaded {
            ThrottleState::Reduced
        } else {
            ThrottleState::Normal
        };

        if self.state != previous {
            log::info!(
                "Governor {} -> {} (smoothed {:.1} fps, {} live)",
                previous.as_str(),
                self.state.as_str(),
                smoothed_fps,
                live_entities
            );
        }

        Evaluation {
            previous,
            state: self.state,
            sampled_fps,
            smoothed_fps,
            live_entities,
        }
    }

    /// Forget all samples and return to `Normal`
    pub fn reset(&mut self) {
        self.window_start_ms = None;
        self.frames_in_window = 0;
        self.history.clear();
        self.state = ThrottleState::Normal;
    }
}
