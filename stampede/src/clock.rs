//! Stage timeline of a scenario.
//!
//! The clock is a pure function of elapsed time: it never sleeps and holds no runtime state.
//! Executors poll it from their tick loop; [`ScenarioClock::samples`] yields the same timeline
//! lazily for previews and tests.
use stampede_core::{ConfigurationError, ExecutorKind, ScenarioConfig, Stage};
use std::time::Duration;

/// Target at `elapsed` with linear interpolation between stage boundaries.
///
/// Each stage ramps from the previous stage's target (or `start` for the first one) to its own
/// target over its duration. Zero-duration stages jump straight to their target. Past the final
/// stage the final target holds.
pub fn target_at(start: f64, stages: &[Stage], elapsed: Duration) -> f64 {
    let mut from = start;
    let mut offset = Duration::ZERO;

    for stage in stages {
        let end = offset + stage.duration;
        if elapsed < end {
            let progress = (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
            return from + (stage.target - from) * progress;
        }
        from = stage.target;
        offset = end;
    }

    from
}

/// Target at `elapsed` where each stage holds its target for its whole duration.
pub fn step_target_at(stages: &[Stage], elapsed: Duration) -> f64 {
    let mut offset = Duration::ZERO;

    for stage in stages {
        offset += stage.duration;
        if elapsed < offset {
            return stage.target;
        }
    }

    stages.last().map(|stage| stage.target).unwrap_or(0.)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Targets ramp linearly between stages.
    Interpolated,
    /// Targets change in steps at stage boundaries.
    Step,
}

impl Shape {
    pub fn for_executor(executor: ExecutorKind) -> Self {
        match executor {
            ExecutorKind::RateRamped => Self::Interpolated,
            ExecutorKind::FixedPopulation | ExecutorKind::ConstantConcurrency => Self::Step,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScenarioClock {
    shape: Shape,
    start: f64,
    stages: Vec<Stage>,
    tick: Duration,
    total: Duration,
}

impl ScenarioClock {
    pub fn new(
        shape: Shape,
        start: f64,
        stages: Vec<Stage>,
        tick: Duration,
    ) -> Result<Self, ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::EmptyStages);
        }
        if tick.is_zero() {
            return Err(ConfigurationError::ZeroDuration("tick"));
        }

        let total = stages.iter().map(|stage| stage.duration).sum();
        Ok(Self {
            shape,
            start,
            stages,
            tick,
            total,
        })
    }

    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigurationError> {
        let start = match config.executor {
            ExecutorKind::RateRamped => config.start_target,
            _ => 0.,
        };
        Self::new(
            Shape::for_executor(config.executor),
            start,
            config.stages.clone(),
            config.tick,
        )
    }

    pub fn target_at(&self, elapsed: Duration) -> f64 {
        match self.shape {
            Shape::Interpolated => target_at(self.start, &self.stages, elapsed),
            Shape::Step => step_target_at(&self.stages, elapsed),
        }
    }

    /// Summed duration of all stages.
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    /// Highest target reached at or after `elapsed`.
    pub fn peak_after(&self, elapsed: Duration) -> f64 {
        let mut offset = Duration::ZERO;
        let mut peak = self.target_at(elapsed);

        for stage in &self.stages {
            offset += stage.duration;
            if offset > elapsed {
                peak = peak.max(stage.target);
            }
        }

        peak
    }

    /// Lazily walks the timeline at tick granularity, always ending with a sample at
    /// [`ScenarioClock::total`].
    pub fn samples(&self) -> Samples<'_> {
        Samples {
            clock: self,
            next: Some(Duration::ZERO),
        }
    }
}

pub struct Samples<'a> {
    clock: &'a ScenarioClock,
    next: Option<Duration>,
}

impl Iterator for Samples<'_> {
    type Item = (Duration, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let elapsed = self.next?;
        let total = self.clock.total;

        self.next = if elapsed >= total {
            None
        } else {
            Some((elapsed + self.clock.tick).min(total))
        };

        Some((elapsed, self.clock.target_at(elapsed)))
    }
}
